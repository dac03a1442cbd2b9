pub mod changeform;
pub mod collaborators;
pub mod error;
pub mod inline;
pub mod media;
pub mod nested;
pub mod request;
pub mod resolver;
pub mod reverse;
pub mod site;

pub use changeform::*;
pub use collaborators::*;
pub use error::*;
pub use inline::*;
pub use media::*;
pub use nested::*;
pub use request::*;
pub use resolver::*;
pub use reverse::*;
pub use site::*;
