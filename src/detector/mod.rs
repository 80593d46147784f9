mod tap_detector;

pub use tap_detector::TapMismatchDetector;
