pub(crate) mod main;
pub(crate) mod print;
pub(crate) mod run;
