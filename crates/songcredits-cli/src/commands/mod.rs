pub mod login;
pub mod run;
pub mod sink;
pub mod source;
pub mod status;
pub mod vlc_setup;
