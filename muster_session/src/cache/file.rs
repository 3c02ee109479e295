//! A credential cache backed by a local file

use std::{io, path::PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;

use super::{CacheError, CredentialCache};
use crate::token::BearerToken;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCredential {
    token: BearerToken,
}

/// A credential cache that keeps the token in a local JSON file
///
/// The file is created with mode 0o600 on unix so the credential is not
/// readable by other users.
#[derive(Debug)]
pub struct FileCredentialCache {
    path: PathBuf,
}

impl FileCredentialCache {
    /// Constructs a new file credential cache
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_token(&self) -> Result<Option<BearerToken>, io::Error> {
        use tokio::io::AsyncReadExt;

        let mut file = match OpenOptions::new().read(true).open(&self.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let mut data = String::new();
        file.read_to_string(&mut data).await?;
        let persisted: PersistedCredential = serde_json::from_str(&data)?;
        Ok(Some(persisted.token))
    }

    async fn write_token(&self, token: &BearerToken) -> Result<(), io::Error> {
        use tokio::io::AsyncWriteExt;

        let mut file_opts = OpenOptions::new();

        file_opts.create(true).truncate(true).write(true);

        #[cfg(unix)]
        file_opts.mode(0o600);

        let mut file = file_opts.open(&self.path).await?;
        let data = serde_json::to_string_pretty(&PersistedCredential {
            token: token.clone(),
        })?;
        file.write_all(data.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialCache for FileCredentialCache {
    async fn load(&self) -> Result<Option<BearerToken>, CacheError> {
        Ok(self.read_token().await?)
    }

    async fn store(&self, token: &BearerToken) -> Result<(), CacheError> {
        Ok(self.write_token(token).await?)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
