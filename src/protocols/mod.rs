pub mod https;

#[cfg(test)]
pub mod test_server;
