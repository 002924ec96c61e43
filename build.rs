fn main() {
    // Set linker flags for macOS to help dylib resolution
    #[cfg(target_os = "macos")]
    {
        println!("cargo:rustc-link-arg=-Wl,-rpath,@executable_path/../Frameworks");
    }

    // The desktop shell needs tauri.conf.json processed; the CLI does not.
    #[cfg(feature = "gui")]
    tauri_build::build();
}
