mod docker;
mod local;

pub use docker::DockerBackend;
pub use local::{LocalBackend, ISOLATION_NOTICE};
