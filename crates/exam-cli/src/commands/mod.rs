mod folders;
mod init;
mod interactive;
mod misc;
mod papers;
mod questions;
mod remote;
mod sync;

pub use folders::handle_folder;
pub use init::handle_init;
pub use interactive::{handle_grade, handle_take};
pub use misc::handle_completions;
pub use papers::handle_paper;
pub use questions::{handle_edit, handle_score, Edit};
pub use remote::handle_remote;
pub use sync::handle_sync;
