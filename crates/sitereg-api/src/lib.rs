// sitereg-api: Async Rust clients for the device registry and metadata publisher

pub mod error;
pub mod models;
pub mod publish;
pub mod registry;
pub mod transport;

pub use error::Error;
pub use models::{
    DeviceCredential, DeviceList, DevicePayload, PublishRequest, RegistryInfo, RemoteDevice,
};
pub use publish::Publisher;
pub use registry::RegistryClient;
pub use transport::Transport;
