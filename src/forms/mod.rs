pub mod field;
pub mod form;
pub mod formset;
pub mod inline;
pub mod reverse;

pub use field::*;
pub use form::*;
pub use formset::*;
pub use inline::*;
pub use reverse::*;
