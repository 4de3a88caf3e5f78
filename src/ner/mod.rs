pub mod interface;
pub mod masking;
pub mod remote;
pub mod gazetteer;
pub mod factory;
pub mod service;

pub use interface::RecognizedEntity;
pub use masking::MaskedText;
pub use factory::NerFactory;
pub use service::NerService;
