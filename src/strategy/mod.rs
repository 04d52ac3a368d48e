//! Strategy layer — gauge selection and position sizing.

pub mod selector;

pub use selector::GaugeSelector;
