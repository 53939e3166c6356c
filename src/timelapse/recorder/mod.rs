pub mod command;
pub mod progress;
pub mod state;
pub mod supervisor;
pub mod timer;

pub use command::{build_command, output_path_for, timestamp_filter};
pub use progress::{parse_stats_line, EncoderProgress};
pub use state::{ActiveSession, SelectedWindow, SessionPhase, SessionState};
pub use supervisor::{FfmpegSupervisor, ProcessInfo, ProcessStatus, ProcessSupervisor};
pub use timer::{format_elapsed, SessionTimer};
