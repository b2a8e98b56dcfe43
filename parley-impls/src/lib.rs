mod responders;

pub use responders::*;
