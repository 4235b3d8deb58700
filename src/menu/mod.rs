pub mod handlers;
pub mod main_menu;
pub mod progress_view;

pub use main_menu::show_main_menu;
pub use progress_view::TerminalProgress;
