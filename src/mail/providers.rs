/// Well-known IMAP/SMTP endpoints keyed by address domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderHosts {
    pub imap_host: &'static str,
    pub smtp_host: &'static str,
    pub smtp_port: u16,
}

const PROVIDERS: &[(&str, ProviderHosts)] = &[
    ("gmail.com", hosts("imap.gmail.com", "smtp.gmail.com")),
    ("outlook.com", hosts("outlook.office365.com", "smtp.office365.com")),
    ("hotmail.com", hosts("outlook.office365.com", "smtp.office365.com")),
    ("live.com", hosts("outlook.office365.com", "smtp.office365.com")),
    ("yahoo.com", hosts("imap.mail.yahoo.com", "smtp.mail.yahoo.com")),
    ("icloud.com", hosts("imap.mail.me.com", "smtp.mail.me.com")),
];

const fn hosts(imap_host: &'static str, smtp_host: &'static str) -> ProviderHosts {
    ProviderHosts {
        imap_host,
        smtp_host,
        smtp_port: 587,
    }
}

/// Look up the provider for `address` by its domain, case-insensitively.
pub fn for_address(address: &str) -> Option<ProviderHosts> {
    let (_, domain) = address.rsplit_once('@')?;
    let domain = domain.trim().to_ascii_lowercase();
    PROVIDERS
        .iter()
        .find(|(d, _)| *d == domain)
        .map(|(_, h)| *h)
}
