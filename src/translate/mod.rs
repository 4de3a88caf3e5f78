pub mod interface;
pub mod client;
pub mod romanize;
pub mod knowledge;
pub mod postprocess;
pub mod entity;
pub mod service;
pub mod factory;

pub use interface::{EntitySource, ResolvedEntity};
pub use service::TranslationService;
pub use factory::TranslationFactory;
