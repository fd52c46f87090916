extern crate keyring;

use std::error::Error;

pub fn get_token(remote_host: &str, username: &str) -> Result<String, Box<dyn Error>> {
    let service = format!("locsync::{}", remote_host);
    let entry = keyring::Entry::new(&service, username);
    log::info!(
        "Get api token for service '{}' and user '{}'",
        &service,
        &username
    );
    Ok(entry.get_password()?)
}

pub fn set_token(
    remote_host: &str,
    username: &str,
    token: &str,
) -> Result<(), Box<dyn Error>> {
    let service = format!("locsync::{}", remote_host);
    let entry = keyring::Entry::new(&service, username);
    log::info!(
        "Store api token for service '{}' and user '{}'",
        &service,
        &username
    );
    entry.set_password(token)?;
    Ok(())
}
