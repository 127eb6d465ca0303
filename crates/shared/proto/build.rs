fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var(
        "PROTOC",
        protoc_bin_vendored::protoc_bin_path().expect("vendored protoc binary"),
    );

    // Compile post service proto
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/post.proto"], &["proto/"])?;

    // Compile user service proto (client only; the service itself lives elsewhere)
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&["proto/user.proto"], &["proto/"])?;

    Ok(())
}
