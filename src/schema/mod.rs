pub mod act;
pub mod reply;
pub mod scene;
