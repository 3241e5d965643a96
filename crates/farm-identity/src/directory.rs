//! Directory service seam
//!
//! The registry only needs `account id -> raw name`. Sanitizing happens in
//! the registry, so implementations return names as the directory holds them.

use crate::error::IdentityError;
use std::collections::HashMap;
use std::process::Command;

/// Account lookup capability
#[cfg_attr(test, mockall::automock)]
pub trait DirectoryService: Send + Sync {
    /// Raw display name for `account_id`
    ///
    /// # Errors
    /// [`IdentityError::IdentityNotResolved`] when the directory has no usable answer.
    fn lookup(&self, account_id: &str) -> Result<String, IdentityError>;
}

/// Fixed account table
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: HashMap<String, String>,
}

impl StaticDirectory {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With one account
    #[must_use]
    pub fn with_entry(mut self, account_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.entries.insert(account_id.into(), name.into());
        self
    }
}

impl DirectoryService for StaticDirectory {
    fn lookup(&self, account_id: &str) -> Result<String, IdentityError> {
        self.entries
            .get(account_id)
            .cloned()
            .ok_or_else(|| IdentityError::IdentityNotResolved {
                account_id: account_id.to_string(),
                reason: "not in static directory".to_string(),
            })
    }
}

/// Directory lookup by running `ldapsearch`
#[derive(Debug, Clone)]
pub struct LdapSearchDirectory {
    /// Program to run
    pub program: String,
    /// Directory host
    pub host: String,
    /// Search base
    pub base_dn: String,
    /// Bind DN with `{account}` placeholder; anonymous bind when absent
    pub bind_dn: Option<String>,
    /// Attribute holding the name
    pub attribute: String,
    /// Request StartTLS
    pub start_tls: bool,
    /// Prompt for the bind password
    pub prompt_password: bool,
}

impl Default for LdapSearchDirectory {
    fn default() -> Self {
        Self {
            program: "ldapsearch".to_string(),
            host: "localhost".to_string(),
            base_dn: "dc=example,dc=edu".to_string(),
            bind_dn: None,
            attribute: "mail".to_string(),
            start_tls: false,
            prompt_password: false,
        }
    }
}

impl LdapSearchDirectory {
    /// Directory on `host` searching under `base_dn`
    #[must_use]
    pub fn new(host: impl Into<String>, base_dn: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            base_dn: base_dn.into(),
            ..Self::default()
        }
    }

    /// Authenticated bind as `template`, with `{account}` replaced
    #[must_use]
    pub fn with_bind_dn(mut self, template: impl Into<String>) -> Self {
        self.bind_dn = Some(template.into());
        self
    }

    /// Read the name from `attribute`
    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    /// Argument vector for looking up `account_id`
    #[must_use]
    pub fn args(&self, account_id: &str) -> Vec<String> {
        let mut args = vec!["-h".to_string(), self.host.clone(), "-LLL".to_string()];
        match &self.bind_dn {
            Some(template) => {
                args.push("-D".to_string());
                args.push(template.replace("{account}", account_id));
            }
            None => args.push("-x".to_string()),
        }
        if self.start_tls {
            args.push("-Z".to_string());
        }
        args.extend(["-b".to_string(), self.base_dn.clone(), "-s".to_string(), "sub".to_string()]);
        if self.prompt_password {
            args.push("-W".to_string());
        }
        args.extend([format!("uid={account_id}"), "uid".to_string(), self.attribute.clone()]);
        args
    }

    /// Pull the name out of LDIF output
    ///
    /// For `mail` the local part before `@` is used.
    #[must_use]
    pub fn parse_output(&self, ldif: &str) -> Option<String> {
        let prefix = format!("{}:", self.attribute);
        let value = ldif
            .lines()
            .find_map(|line| line.strip_prefix(prefix.as_str()))?
            .trim();
        let name = if self.attribute == "mail" {
            value.split('@').next().unwrap_or(value)
        } else {
            value
        };
        (!name.is_empty()).then(|| name.to_string())
    }
}

impl DirectoryService for LdapSearchDirectory {
    fn lookup(&self, account_id: &str) -> Result<String, IdentityError> {
        let not_resolved = |reason: String| IdentityError::IdentityNotResolved {
            account_id: account_id.to_string(),
            reason,
        };

        tracing::debug!(account_id, host = %self.host, "running ldapsearch");
        let output = Command::new(&self.program)
            .args(self.args(account_id))
            .output()
            .map_err(|e| not_resolved(format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(not_resolved(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        self.parse_output(&stdout)
            .ok_or_else(|| not_resolved(format!("no {} attribute in directory entry", self.attribute)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_bind_mode() {
        let anon = LdapSearchDirectory::new("ldap.example.edu", "dc=example,dc=edu");
        assert_eq!(
            anon.args("120988"),
            vec!["-h", "ldap.example.edu", "-LLL", "-x", "-b", "dc=example,dc=edu", "-s", "sub", "uid=120988", "uid", "mail"]
        );

        let mut bound = anon.with_bind_dn("uid={account},ou=people,dc=example,dc=edu");
        bound.start_tls = true;
        bound.prompt_password = true;
        let args = bound.args("120988");
        assert!(args.contains(&"uid=120988,ou=people,dc=example,dc=edu".to_string()));
        assert!(args.contains(&"-Z".to_string()));
        assert!(args.contains(&"-W".to_string()));
        assert!(!args.contains(&"-x".to_string()));
    }

    #[test]
    fn parses_mail_local_part() {
        let dir = LdapSearchDirectory::default();
        let ldif = "dn: uid=120988,ou=people,dc=example,dc=edu\nuid: 120988\nmail: Alice.Smith@example.edu\n";
        assert_eq!(dir.parse_output(ldif), Some("Alice.Smith".to_string()));
        assert_eq!(dir.parse_output("dn: x\n"), None);
    }

    #[test]
    fn parses_other_attributes_verbatim() {
        let dir = LdapSearchDirectory::default().with_attribute("cn");
        assert_eq!(dir.parse_output("cn: Alice Smith\n"), Some("Alice Smith".to_string()));
    }

    #[test]
    fn missing_program_is_not_resolved() {
        let dir = LdapSearchDirectory {
            program: "/nonexistent/ldapsearch".to_string(),
            ..LdapSearchDirectory::default()
        };
        let err = dir.lookup("120988").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn static_directory() {
        let dir = StaticDirectory::new().with_entry("1", "Ann");
        assert_eq!(dir.lookup("1").unwrap(), "Ann");
        assert!(dir.lookup("2").is_err());
    }
}
