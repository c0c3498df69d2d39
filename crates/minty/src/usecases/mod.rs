mod directory;
mod execute;
pub mod ports;
mod session;
mod system;

pub use directory::{TrackedDirUseCase, TrackedDirUseCaseImpl};
pub use execute::{ExecuteInput, ExecuteUseCase, ExecuteUseCaseImpl};
pub use session::{
    CreateSessionInput, CreateSessionOutput, CreateSessionUseCase, CreateSessionUseCaseImpl,
    RemoveSessionUseCase, RemoveSessionUseCaseImpl, ResizeInput, ResizeUseCase,
    ResizeUseCaseImpl, SessionInfoOutput, SessionInfoUseCase, SessionInfoUseCaseImpl,
    SessionSummary, SessionsUseCase, SessionsUseCaseImpl, SignalUseCase, SignalUseCaseImpl,
    WriteInput, WriteUseCase, WriteUseCaseImpl,
};
pub use system::{
    HealthOutput, HealthUseCase, HealthUseCaseImpl, ShutdownOutput, ShutdownUseCase,
    ShutdownUseCaseImpl,
};
