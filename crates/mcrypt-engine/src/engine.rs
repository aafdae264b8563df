//! The engine facade and capability reporting

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use mcrypt_container::{
    decrypt_directory, encrypt_directory, DecryptMode, DirectoryManifest, EncryptMode,
    FileCrypter,
};
use mcrypt_core::config::{EngineConfig, KdfConfig};
use mcrypt_core::{
    Algorithm, AlgorithmInfo, CryptoResult, KeySize, SecurityLevel,
};
use mcrypt_crypto::material::{self, Key};
use secrecy::SecretString;
use mcrypt_crypto::symmetric::{Envelope, SymmetricEngine};
use mcrypt_crypto::{asymmetric, kem, signing};
use mcrypt_pool::WorkerPool;

/// The assembled encryption engine.
///
/// Built once as direct or pooled; batch operations route through the pool
/// only in pooled mode. Key material handed to pooled work is cloned into
/// the task, never shared by reference across the worker boundary.
pub struct Engine {
    symmetric: SymmetricEngine,
    crypter: FileCrypter,
    kdf: KdfConfig,
    pool: Option<WorkerPool>,
}

impl Engine {
    /// In-process engine: batch operations run synchronously.
    pub fn direct(config: EngineConfig) -> Self {
        let symmetric = SymmetricEngine::new(&config.symmetric);
        let crypter = FileCrypter::new(symmetric.clone(), config.container.clone());
        info!(mode = "direct", "engine ready");
        Self {
            symmetric,
            crypter,
            kdf: config.kdf,
            pool: None,
        }
    }

    /// Pooled engine: batch operations fan out across a fixed worker pool.
    pub fn pooled(config: EngineConfig) -> Self {
        let symmetric = SymmetricEngine::new(&config.symmetric);
        let crypter = FileCrypter::new(symmetric.clone(), config.container.clone());
        let pool = WorkerPool::new(&config.pool);
        info!(mode = "pooled", workers = pool.size(), "engine ready");
        Self {
            symmetric,
            crypter,
            kdf: config.kdf,
            pool: Some(pool),
        }
    }

    /// Derive a key from a password with the configured iteration count.
    pub fn derive_key(&self, password: &SecretString, salt: &[u8]) -> CryptoResult<Key> {
        material::derive_key_from_password(password, salt, self.kdf.iterations, KeySize::Bits256)
    }

    /// Generate a fresh random salt of the configured length.
    pub fn generate_salt(&self) -> Vec<u8> {
        material::generate_salt(self.kdf.salt_len)
    }

    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    pub fn symmetric(&self) -> &SymmetricEngine {
        &self.symmetric
    }

    pub fn crypter(&self) -> &FileCrypter {
        &self.crypter
    }

    /// Encrypt one buffer in-process.
    pub fn encrypt(&self, plaintext: &[u8], key: &Key) -> CryptoResult<Envelope> {
        self.symmetric.encrypt(plaintext, key)
    }

    /// Decrypt one envelope in-process.
    pub fn decrypt(&self, envelope: &Envelope, key: &Key) -> CryptoResult<Vec<u8>> {
        self.symmetric.decrypt(envelope, key)
    }

    /// Encrypt a batch of records, returning per-record outcomes in input
    /// order.
    pub async fn encrypt_batch(
        &self,
        records: Vec<Vec<u8>>,
        key: &Key,
    ) -> Vec<CryptoResult<Envelope>> {
        match &self.pool {
            Some(pool) => {
                let engine = self.symmetric.clone();
                let key = Arc::new(key.clone());
                pool.batch(records, move |record| engine.encrypt(record, &key))
                    .await
            }
            None => records
                .iter()
                .map(|record| self.symmetric.encrypt(record, key))
                .collect(),
        }
    }

    /// Decrypt a batch of envelopes, returning per-record outcomes in input
    /// order.
    pub async fn decrypt_batch(
        &self,
        envelopes: Vec<Envelope>,
        key: &Key,
    ) -> Vec<CryptoResult<Vec<u8>>> {
        match &self.pool {
            Some(pool) => {
                let engine = self.symmetric.clone();
                let key = Arc::new(key.clone());
                pool.batch(envelopes, move |envelope| engine.decrypt(envelope, &key))
                    .await
            }
            None => envelopes
                .iter()
                .map(|envelope| self.symmetric.decrypt(envelope, key))
                .collect(),
        }
    }

    /// Encrypt a single file into a container.
    pub fn encrypt_file(
        &self,
        src: &Path,
        dst: &Path,
        mode: &EncryptMode<'_>,
    ) -> CryptoResult<mcrypt_container::ContainerMetadata> {
        self.crypter.encrypt_file(src, dst, mode)
    }

    /// Decrypt a single container.
    pub fn decrypt_file(
        &self,
        src: &Path,
        dst: &Path,
        mode: &DecryptMode<'_>,
    ) -> CryptoResult<mcrypt_container::ContainerMetadata> {
        self.crypter.decrypt_file(src, dst, mode)
    }

    /// Encrypt a directory tree; partial failures land in the manifest.
    pub fn encrypt_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        mode: &EncryptMode<'_>,
    ) -> CryptoResult<DirectoryManifest> {
        encrypt_directory(&self.crypter, input_dir, output_dir, mode)
    }

    /// Decrypt a directory tree previously produced by
    /// [`Engine::encrypt_directory`].
    pub fn decrypt_directory(
        &self,
        encrypted_dir: &Path,
        output_dir: &Path,
        mode: &DecryptMode<'_>,
    ) -> CryptoResult<DirectoryManifest> {
        decrypt_directory(&self.crypter, encrypted_dir, output_dir, mode)
    }
}

/// Capability descriptors for every algorithm family the engine exposes.
pub fn algorithm_info() -> Vec<AlgorithmInfo> {
    vec![
        AlgorithmInfo {
            algorithm: Algorithm::Aes128Gcm,
            key_bits: 128,
            security_level: SecurityLevel::Standard,
            simulated: false,
            authenticated: true,
        },
        AlgorithmInfo {
            algorithm: Algorithm::Aes256Gcm,
            key_bits: 256,
            security_level: SecurityLevel::High,
            simulated: false,
            authenticated: true,
        },
        AlgorithmInfo {
            algorithm: Algorithm::Aes256Ctr,
            key_bits: 256,
            security_level: SecurityLevel::Standard,
            simulated: false,
            authenticated: false,
        },
        AlgorithmInfo {
            algorithm: Algorithm::RsaOaep,
            key_bits: asymmetric::MIN_RSA_BITS,
            security_level: SecurityLevel::High,
            simulated: false,
            authenticated: false,
        },
        AlgorithmInfo {
            algorithm: Algorithm::HybridRsaAes,
            key_bits: 256,
            security_level: SecurityLevel::High,
            simulated: false,
            authenticated: true,
        },
        AlgorithmInfo {
            algorithm: Algorithm::QsKem768,
            key_bits: (kem::KEM_SHARED_SECRET_LEN * 8),
            security_level: SecurityLevel::Simulated,
            simulated: true,
            authenticated: true,
        },
        AlgorithmInfo {
            algorithm: Algorithm::QsDsa65,
            key_bits: (signing::SIG_PUBLIC_KEY_LEN * 8),
            security_level: SecurityLevel::Simulated,
            simulated: true,
            authenticated: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcrypt_core::KeySize;

    #[test]
    fn test_algorithm_info_marks_simulated_family() {
        let info = algorithm_info();

        let kem = info
            .iter()
            .find(|i| i.algorithm == Algorithm::QsKem768)
            .unwrap();
        assert!(kem.simulated);
        assert_eq!(kem.security_level, SecurityLevel::Simulated);

        let aes = info
            .iter()
            .find(|i| i.algorithm == Algorithm::Aes256Gcm)
            .unwrap();
        assert!(!aes.simulated);
    }

    #[test]
    fn test_direct_engine_roundtrip() {
        let engine = Engine::direct(EngineConfig::default());
        assert!(!engine.is_pooled());

        let key = Key::generate(KeySize::Bits256);
        let envelope = engine.encrypt(b"direct mode", &key).unwrap();
        assert_eq!(engine.decrypt(&envelope, &key).unwrap(), b"direct mode");
    }

    #[test]
    fn test_derived_key_roundtrip() {
        let mut config = EngineConfig::default();
        config.symmetric.timing_floor_ms = 0;
        config.kdf.iterations = 100_000;
        let engine = Engine::direct(config);

        let password = SecretString::from("engine-level password");
        let salt = engine.generate_salt();
        assert_eq!(salt.len(), 16);

        let k1 = engine.derive_key(&password, &salt).unwrap();
        let k2 = engine.derive_key(&password, &salt).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());

        let envelope = engine.encrypt(b"password-derived", &k1).unwrap();
        assert_eq!(engine.decrypt(&envelope, &k2).unwrap(), b"password-derived");
    }

    #[tokio::test]
    async fn test_direct_batch_runs_in_process() {
        let mut config = EngineConfig::default();
        config.symmetric.timing_floor_ms = 0;
        let engine = Engine::direct(config);
        let key = Key::generate(KeySize::Bits256);

        let records: Vec<Vec<u8>> = (0..10u8).map(|i| vec![i; 32]).collect();
        let envelopes: Vec<Envelope> = engine
            .encrypt_batch(records.clone(), &key)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let decrypted = engine.decrypt_batch(envelopes, &key).await;
        for (record, result) in records.iter().zip(decrypted) {
            assert_eq!(&result.unwrap(), record);
        }
    }
}
