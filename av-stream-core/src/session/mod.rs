pub mod capture;
pub mod gateway;

#[cfg(test)]
pub(crate) mod test_support;
