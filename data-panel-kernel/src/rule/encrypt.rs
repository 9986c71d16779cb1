use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{KernelError, Result};
use crate::rule::config::{AlgorithmConfiguration, EncryptColumnConfiguration, EncryptRuleConfiguration};
use crate::value::SQLValue;

const MAX_NUMERIC_LETTER_CHAR: u32 = 255;

pub enum EncryptAlgorithm {
    /// Symmetric stream cipher, cipher text is hex encoded.
    Rc4 { key: Vec<u8> },
    /// Salted digest for equality lookups.
    Sha256 { salt: String },
    /// Per character digest that keeps `%` and `_` so LIKE patterns still match.
    CharDigestLike { delta: u32, mask: u32, start: u32 },
}

impl EncryptAlgorithm {
    pub fn create(name: &str, config: &AlgorithmConfiguration) -> Result<Self> {
        match config.algorithm_type.to_uppercase().as_str() {
            "RC4" => {
                let key = config.require_string(name, "rc4-key-value")?;
                if key.is_empty() || key.len() > 256 {
                    return Err(KernelError::invalid_rule(format!("`rc4-key-value` of `{}` must be 1 to 256 bytes", name)));
                }
                Ok(EncryptAlgorithm::Rc4 { key: key.into_bytes() })
            }
            "SHA256" => Ok(EncryptAlgorithm::Sha256 {
                salt: config.get_string("salt").unwrap_or_default(),
            }),
            "CHAR_DIGEST_LIKE" => Ok(EncryptAlgorithm::CharDigestLike {
                delta: get_u32(name, config, "delta", 1)?,
                mask: get_u32(name, config, "mask", 0x0F7D)?,
                start: get_u32(name, config, "start", 0x4E00)?,
            }),
            other => Err(KernelError::invalid_rule(format!("Unknown encrypt algorithm type `{}` of `{}`", other, name))),
        }
    }

    pub fn encrypt(&self, value: &SQLValue) -> SQLValue {
        if value.is_null() {
            return SQLValue::Null;
        }
        let plain = value.as_plain_string();
        match self {
            EncryptAlgorithm::Rc4 { key } => SQLValue::Text(hex::encode(rc4(key, plain.as_bytes()))),
            EncryptAlgorithm::Sha256 { salt } => {
                let mut hasher = Sha256::new();
                hasher.update(salt.as_bytes());
                hasher.update(plain.as_bytes());
                SQLValue::Text(hex::encode(hasher.finalize()))
            }
            EncryptAlgorithm::CharDigestLike { delta, mask, start } => {
                SQLValue::Text(plain.chars().map(|each| digest_char(each, *delta, *mask, *start)).collect())
            }
        }
    }

    /// Only the cipher of RC4 can be reversed.
    pub fn decrypt(&self, cipher: &str) -> Option<String> {
        match self {
            EncryptAlgorithm::Rc4 { key } => {
                let bytes = hex::decode(cipher).ok()?;
                String::from_utf8(rc4(key, &bytes)).ok()
            }
            _ => None,
        }
    }
}

impl fmt::Debug for EncryptAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptAlgorithm::Rc4 { .. } => f.write_str("Rc4"),
            EncryptAlgorithm::Sha256 { .. } => f.write_str("Sha256"),
            EncryptAlgorithm::CharDigestLike { delta, mask, start } => write!(f, "CharDigestLike({}, {:#x}, {:#x})", delta, mask, start),
        }
    }
}

fn get_u32(name: &str, config: &AlgorithmConfiguration, key: &str, default: u32) -> Result<u32> {
    match config.get_u64(key) {
        Some(value) => u32::try_from(value)
            .map_err(|_| KernelError::invalid_rule(format!("`{}` of `{}` is out of range: {}", key, name, value))),
        None => Ok(default),
    }
}

fn digest_char(original: char, delta: u32, mask: u32, start: u32) -> char {
    if original == '%' || original == '_' {
        return original;
    }
    let code = original as u32;
    let masked = match code.checked_add(delta) {
        Some(shifted) if code <= MAX_NUMERIC_LETTER_CHAR => Some(shifted & mask),
        Some(shifted) => (shifted & mask).checked_add(start),
        None => None,
    };
    match masked.and_then(std::char::from_u32) {
        // a digest must not turn into a wildcard
        Some('%') | Some('_') | None => original,
        Some(each) => each,
    }
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut state: Vec<u8> = (0..=255u8).collect();
    let mut j = 0usize;
    for i in 0..256 {
        j = (j + state[i] as usize + key[i % key.len()] as usize) % 256;
        state.swap(i, j);
    }
    let (mut i, mut j) = (0usize, 0usize);
    data.iter()
        .map(|each| {
            i = (i + 1) % 256;
            j = (j + state[i] as usize) % 256;
            state.swap(i, j);
            each ^ state[(state[i] as usize + state[j] as usize) % 256]
        })
        .collect()
}

/**
 * A logic column stored encrypted. `cipher` holds the cipher text; the
 * optional shadow columns hold an assisted-query digest, a like-query digest
 * and the plain text.
 */
#[derive(Debug, Clone)]
pub struct EncryptColumn {
    logic_column: String,
    cipher: String,
    assisted_query: Option<String>,
    like_query: Option<String>,
    plain: Option<String>,
    encryptor: Arc<EncryptAlgorithm>,
    assisted_query_encryptor: Option<Arc<EncryptAlgorithm>>,
    like_query_encryptor: Option<Arc<EncryptAlgorithm>>,
}

impl EncryptColumn {
    pub fn new(logic_column: &str, cipher: &str, encryptor: Arc<EncryptAlgorithm>) -> Self {
        EncryptColumn {
            logic_column: logic_column.to_string(),
            cipher: cipher.to_string(),
            assisted_query: None,
            like_query: None,
            plain: None,
            encryptor,
            assisted_query_encryptor: None,
            like_query_encryptor: None,
        }
    }

    pub fn with_assisted_query(mut self, column: &str, encryptor: Arc<EncryptAlgorithm>) -> Self {
        self.assisted_query = Some(column.to_string());
        self.assisted_query_encryptor = Some(encryptor);
        self
    }

    pub fn with_like_query(mut self, column: &str, encryptor: Arc<EncryptAlgorithm>) -> Self {
        self.like_query = Some(column.to_string());
        self.like_query_encryptor = Some(encryptor);
        self
    }

    pub fn with_plain(mut self, column: &str) -> Self {
        self.plain = Some(column.to_string());
        self
    }

    pub fn get_logic_column(&self) -> &str {
        &self.logic_column
    }

    pub fn get_cipher(&self) -> &str {
        &self.cipher
    }

    pub fn get_assisted_query(&self) -> Option<&str> {
        self.assisted_query.as_deref()
    }

    pub fn get_like_query(&self) -> Option<&str> {
        self.like_query.as_deref()
    }

    pub fn get_plain(&self) -> Option<&str> {
        self.plain.as_deref()
    }

    /// Assisted-query, like-query and plain columns, in that order.
    pub fn get_shadow_columns(&self) -> Vec<&str> {
        self.assisted_query
            .iter()
            .chain(self.like_query.iter())
            .chain(self.plain.iter())
            .map(String::as_str)
            .collect()
    }

    pub fn encrypt_cipher(&self, value: &SQLValue) -> SQLValue {
        self.encryptor.encrypt(value)
    }

    /// Values of the shadow columns, aligned with `get_shadow_columns`.
    pub fn encrypt_shadow_values(&self, value: &SQLValue) -> Vec<SQLValue> {
        let mut result = Vec::with_capacity(3);
        if let Some(encryptor) = &self.assisted_query_encryptor {
            result.push(encryptor.encrypt(value));
        }
        if let Some(encryptor) = &self.like_query_encryptor {
            result.push(encryptor.encrypt(value));
        }
        if self.plain.is_some() {
            result.push(value.clone());
        }
        result
    }

    pub fn encrypt_assisted_query(&self, value: &SQLValue) -> Option<SQLValue> {
        self.assisted_query_encryptor.as_ref().map(|each| each.encrypt(value))
    }

    pub fn encrypt_like_query(&self, value: &SQLValue) -> Option<SQLValue> {
        self.like_query_encryptor.as_ref().map(|each| each.encrypt(value))
    }
}

#[derive(Debug, Clone, Default)]
pub struct EncryptTable {
    columns: Vec<EncryptColumn>,
}

impl EncryptTable {
    pub fn new(columns: Vec<EncryptColumn>) -> Self {
        EncryptTable { columns }
    }

    pub fn find_encrypt_column(&self, logic_column: &str) -> Option<&EncryptColumn> {
        self.columns.iter().find(|each| each.logic_column.eq_ignore_ascii_case(logic_column))
    }

    pub fn get_columns(&self) -> &[EncryptColumn] {
        &self.columns
    }
}

#[derive(Debug, Clone, Default)]
pub struct EncryptRule {
    /// Lower-cased logic table to its encrypted columns.
    tables: BTreeMap<String, EncryptTable>,
}

impl EncryptRule {
    pub fn new() -> Self {
        EncryptRule::default()
    }

    pub fn with_table(mut self, logic_table: &str, table: EncryptTable) -> Self {
        self.tables.insert(logic_table.to_lowercase(), table);
        self
    }

    pub fn from_configuration(config: &EncryptRuleConfiguration) -> Result<Self> {
        let mut encryptors = BTreeMap::new();
        for (name, each) in &config.encryptors {
            encryptors.insert(name.clone(), Arc::new(EncryptAlgorithm::create(name, each)?));
        }
        let find = |name: &str| -> Result<Arc<EncryptAlgorithm>> {
            encryptors
                .get(name)
                .cloned()
                .ok_or_else(|| KernelError::invalid_rule(format!("Encryptor `{}` is not defined", name)))
        };
        let mut result = EncryptRule::new();
        for (table, each) in &config.tables {
            let mut columns = Vec::with_capacity(each.columns.len());
            for (logic_column, column) in &each.columns {
                columns.push(Self::create_column(logic_column, column, &find)?);
            }
            result = result.with_table(table, EncryptTable::new(columns));
        }
        Ok(result)
    }

    fn create_column<F>(logic_column: &str, config: &EncryptColumnConfiguration, find: &F) -> Result<EncryptColumn>
    where
        F: Fn(&str) -> Result<Arc<EncryptAlgorithm>>,
    {
        if config.cipher.is_empty() {
            return Err(KernelError::invalid_rule(format!("Cipher column of `{}` is required", logic_column)));
        }
        let mut result = EncryptColumn::new(logic_column, &config.cipher, find(&config.encryptor)?);
        if let Some(column) = &config.assisted_query {
            let encryptor = config
                .assisted_query_encryptor
                .as_deref()
                .ok_or_else(|| KernelError::invalid_rule(format!("Assisted query column `{}` needs an encryptor", column)))?;
            result = result.with_assisted_query(column, find(encryptor)?);
        }
        if let Some(column) = &config.like_query {
            let encryptor = config
                .like_query_encryptor
                .as_deref()
                .ok_or_else(|| KernelError::invalid_rule(format!("Like query column `{}` needs an encryptor", column)))?;
            result = result.with_like_query(column, find(encryptor)?);
        }
        if let Some(column) = &config.plain {
            result = result.with_plain(column);
        }
        Ok(result)
    }

    pub fn find_encrypt_table(&self, logic_table: &str) -> Option<&EncryptTable> {
        self.tables.get(&logic_table.to_lowercase())
    }

    pub fn find_encrypt_column(&self, logic_table: &str, logic_column: &str) -> Option<&EncryptColumn> {
        self.find_encrypt_table(logic_table)?.find_encrypt_column(logic_column)
    }
}

#[cfg(test)]
mod tests {
    use crate::rule::config::{AlgorithmConfiguration, EncryptRuleConfiguration};
    use crate::error::KernelError;
    use crate::rule::encrypt::{digest_char, EncryptAlgorithm, EncryptRule};
    use crate::value::SQLValue;

    const RULES: &str = r#"
tables:
  t_user:
    columns:
      pwd:
        cipher: pwd_cipher
        assisted_query: pwd_assisted
        plain: pwd_plain
        encryptor: rc4
        assisted_query_encryptor: sha256
      name:
        cipher: name_cipher
        like_query: name_like
        encryptor: rc4
        like_query_encryptor: like
encryptors:
  rc4: { type: RC4, props: { rc4-key-value: secret } }
  sha256: { type: SHA256 }
  like: { type: CHAR_DIGEST_LIKE }
"#;

    fn encrypt_rule() -> EncryptRule {
        let config: EncryptRuleConfiguration = serde_yaml::from_str(RULES).unwrap();
        EncryptRule::from_configuration(&config).unwrap()
    }

    #[test]
    fn test_rc4() {
        // key "Key", plain "Plaintext"
        let algorithm = EncryptAlgorithm::create("rc4", &AlgorithmConfiguration::new("RC4").with_prop("rc4-key-value", "Key")).unwrap();
        assert_eq!(algorithm.encrypt(&SQLValue::from("Plaintext")), SQLValue::from("bbf316e8d940af0ad3"));
        assert_eq!(algorithm.decrypt("bbf316e8d940af0ad3"), Some("Plaintext".to_string()));
        assert_eq!(algorithm.encrypt(&SQLValue::Null), SQLValue::Null);
        assert!(EncryptAlgorithm::create("rc4", &AlgorithmConfiguration::new("RC4")).is_err());
    }

    #[test]
    fn test_sha256() {
        let algorithm = EncryptAlgorithm::create("sha256", &AlgorithmConfiguration::new("SHA256")).unwrap();
        assert_eq!(
            algorithm.encrypt(&SQLValue::from("abc")),
            SQLValue::from("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(algorithm.decrypt("ba78"), None);
    }

    #[test]
    fn test_char_digest_like_keeps_wildcards() {
        let algorithm = EncryptAlgorithm::create("like", &AlgorithmConfiguration::new("CHAR_DIGEST_LIKE")).unwrap();
        let digest = algorithm.encrypt(&SQLValue::from("%ab_")).as_plain_string();
        let chars: Vec<char> = digest.chars().collect();
        assert_eq!(chars.len(), 4);
        assert_eq!(chars[0], '%');
        assert_eq!(chars[3], '_');
        // ('a' + 1) & 0xF7D clears bit 1
        assert_eq!(chars[1], '`');
        assert_eq!(chars[2], 'a');
    }

    #[test]
    fn test_char_digest_like_props_must_fit() {
        let config = AlgorithmConfiguration::new("CHAR_DIGEST_LIKE").with_prop("delta", "4294967296");
        match EncryptAlgorithm::create("like", &config) {
            Err(KernelError::InvalidRuleConfiguration(message)) => assert!(message.contains("delta")),
            _ => panic!("delta wider than 32 bits must be rejected"),
        }
        let config = AlgorithmConfiguration::new("CHAR_DIGEST_LIKE").with_prop("start", 4294967295u64);
        assert!(EncryptAlgorithm::create("like", &config).is_ok());
    }

    #[test]
    fn test_digest_char_overflow_keeps_original() {
        assert_eq!(digest_char('a', u32::MAX, 0x0F7D, 0x4E00), 'a');
        assert_eq!(digest_char('\u{4E2D}', 1, u32::MAX, u32::MAX), '\u{4E2D}');
        assert_eq!(digest_char('a', 1, 0x0F7D, 0x4E00), '`');
    }

    #[test]
    fn test_encrypt_columns() {
        let rule = encrypt_rule();
        let pwd = rule.find_encrypt_column("T_USER", "PWD").unwrap();
        assert_eq!(pwd.get_cipher(), "pwd_cipher");
        assert_eq!(pwd.get_shadow_columns(), vec!["pwd_assisted", "pwd_plain"]);
        let values = pwd.encrypt_shadow_values(&SQLValue::from("abc"));
        assert_eq!(values.len(), 2);
        assert_eq!(values[1], SQLValue::from("abc"));
        let name = rule.find_encrypt_column("t_user", "name").unwrap();
        assert_eq!(name.get_shadow_columns(), vec!["name_like"]);
        assert!(rule.find_encrypt_column("t_user", "id").is_none());
        assert!(rule.find_encrypt_table("t_order").is_none());
    }

    #[test]
    fn test_missing_encryptor() {
        let config: EncryptRuleConfiguration = serde_yaml::from_str(&RULES.replace("encryptor: rc4\n        like", "encryptor: absent\n        like")).unwrap();
        let err = EncryptRule::from_configuration(&config).unwrap_err();
        assert_eq!(err.to_string(), "Invalid rule configuration: Encryptor `absent` is not defined");
    }
}
