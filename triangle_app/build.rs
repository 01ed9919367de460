// build.rs
// Compiles the demo's GLSL shaders to SPIR-V with glslc from the Vulkan SDK.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn compile_shaders(shader_dir: &Path, target_dir: &Path, glslc: &str) {
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_shader = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("vert" | "frag")
        );
        if !is_shader {
            continue;
        }

        let out_file = match path.file_stem() {
            Some(stem) => target_dir.join(stem).with_extension("spv"),
            None => continue,
        };

        // Recompile only when the source is newer than the output.
        let up_to_date = match (std::fs::metadata(&path), std::fs::metadata(&out_file)) {
            (Ok(src), Ok(dst)) => match (src.modified(), dst.modified()) {
                (Ok(src_time), Ok(dst_time)) => src_time <= dst_time,
                _ => false,
            },
            _ => false,
        };
        if up_to_date {
            eprintln!("info: Shader {:?} is up to date", path.file_name());
            continue;
        }

        let status = Command::new(glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {:?} -> {:?}", path.file_name(), out_file.file_name());
            }
            Ok(s) => {
                eprintln!("error: glslc failed for {:?} with exit code: {}", path, s.code().unwrap_or(-1));
                panic!("Shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: Failed to run glslc for {:?}: {}", path, e);
                panic!("Failed to execute shader compiler");
            }
        }
    }
}

fn main() {
    println!("cargo:rerun-if-changed=shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
            eprintln!("hint: Install the Vulkan SDK and set VULKAN_SDK to compile shaders");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };
    if !Path::new(&glslc).exists() {
        eprintln!("error: glslc not found at: {}", glslc);
        panic!("Shader compiler not found");
    }

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("set by cargo"));
    let shader_dir = manifest_dir.join("shaders");
    // Matches the locations render_core's shader path resolution probes.
    let target_dir = manifest_dir.join("../target/shaders");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("error: Failed to create {:?}: {}", target_dir, e);
        return;
    }

    compile_shaders(&shader_dir, &target_dir, &glslc);
}
