pub mod edf;
pub mod emg;
pub mod lfp;
pub mod session;
pub mod spikes;
pub mod text;
