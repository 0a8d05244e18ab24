pub mod assets;
pub mod auth;

#[cfg(test)]
pub(crate) mod test_support;
