mod common;
mod routing;
mod summary;
