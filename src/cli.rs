use clap::Parser;
use uuid::Uuid;

/// Houdini scene graph console: fetch and inspect a node-graph context
/// from the render backend.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Scene file UUID (assigned by the backend on upload)
    #[arg(value_name = "FILE_UUID")]
    pub file: Uuid,

    /// Render backend base URL
    #[arg(short = 'b', long = "backend", value_name = "URL", default_value = "http://127.0.0.1:5000")]
    pub backend: String,

    /// Context path to display
    #[arg(short = 'c', long = "context", value_name = "PATH", default_value = "/obj")]
    pub context: String,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["hipgraph", "1f2e3d4c-0000-0000-0000-000000000000"]);
        assert_eq!(args.backend, "http://127.0.0.1:5000");
        assert_eq!(args.context, "/obj");
        assert_eq!(args.verbosity, 0);
    }

    #[test]
    fn test_explicit_context_and_backend() {
        let args = Args::parse_from([
            "hipgraph",
            "1f2e3d4c-0000-0000-0000-000000000000",
            "-b",
            "http://farm:8080",
            "-c",
            "/obj/geo1",
            "-vv",
        ]);
        assert_eq!(args.backend, "http://farm:8080");
        assert_eq!(args.context, "/obj/geo1");
        assert_eq!(args.verbosity, 2);
    }
}
