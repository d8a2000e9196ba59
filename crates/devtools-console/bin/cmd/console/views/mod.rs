pub(crate) mod bottom_bar;
pub(crate) mod console;
pub(crate) mod inspect;
