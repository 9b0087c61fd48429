//! Het gegevensmodel van de interface: requests, parameters, declaraties,
//! blokmodi en fouten.

pub mod decl;
pub mod error;
pub mod mode;
pub mod param;
pub mod request;

pub use decl::{DeclId, Declaration, DeclarationDictionary, StorageClass, TypeKind};
pub use error::{ErrorCollect, ErrorHandler, ErrorIgnore, ErrorKind, ErrorLog, RiError, Severity};
pub use mode::{Mode, ModeStack};
pub use param::{Args, BasicType, Parameter, TokenValue, Values};
pub use request::{Request, RequestGroup, RequestKind};
