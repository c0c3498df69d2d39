pub mod error;
pub mod handlers;
pub mod router;
pub mod usecase_container;

pub use error::DomainError;
pub use router::Router;
pub use router::STREAMING_METHODS;
pub use usecase_container::DaemonServices;
pub use usecase_container::ExecUseCases;
pub use usecase_container::SessionUseCases;
pub use usecase_container::SystemUseCases;
pub use usecase_container::UseCaseContainer;
