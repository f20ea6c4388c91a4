pub mod backend;
pub mod cookies;
pub mod ffmpeg;
pub mod filename;
pub mod paths;
pub mod process;
pub mod queue;
pub mod router;
pub mod single;
pub mod thumbnail;
pub mod ytdlp;
