pub mod audio;
pub mod capture;
pub mod device;
pub mod mixer;
pub mod output;
