// Adapters layer: concrete implementations of the domain ports (model providers, storage).

pub mod content;
pub mod input;
pub mod openrouter;
pub mod proxy;
pub mod storage;

pub use openrouter::{OpenRouterClient, OpenRouterSettings};
pub use proxy::ProxyClient;
pub use storage::LocalStorage;
