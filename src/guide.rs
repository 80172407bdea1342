//! The trust-installation guide written next to the store.

use crate::store::{
    CERT_FILE, FULL_CHAIN_FILE, ISSUED_CERTS_DIR, PKCS12_FILE, PRIVATE_KEY_FILE, PkiStore,
};

/// Markdown instructions for trusting the root and deploying issued bundles.
pub fn render(store: &PkiStore) -> String {
    let root_cert = store.root_cert_path();
    let root_cert = root_cert.display();
    let issued = store.base().join(ISSUED_CERTS_DIR);
    let issued = issued.display();

    format!(
        r#"# Local certificate authority

Certificates under `{issued}` are signed by the root certificate
`{root_cert}`. Clients only accept them once that root is trusted.
Never share `rootCA.key`: anyone holding it can issue certificates your
machines will trust.

## Trusting the root

### Debian / Ubuntu

```sh
sudo cp {root_cert} /usr/local/share/ca-certificates/localca-root.crt
sudo update-ca-certificates
```

### Fedora / RHEL

```sh
sudo cp {root_cert} /etc/pki/ca-trust/source/anchors/localca-root.crt
sudo update-ca-trust
```

### macOS

```sh
sudo security add-trusted-cert -d -r trustRoot \
  -k /Library/Keychains/System.keychain {root_cert}
```

### Windows (elevated PowerShell)

```powershell
Import-Certificate -FilePath {root_cert} -CertStoreLocation Cert:\LocalMachine\Root
```

### Firefox

Firefox keeps its own store: Settings, Privacy & Security, Certificates,
View Certificates, Authorities, Import, then tick "Trust this CA to identify
websites".

## Deploying an issued certificate

Each domain has its own directory under `{issued}/<domain>/`
(wildcards live in `_wildcard.<domain>`):

| file | contents |
|------|----------|
| `{PRIVATE_KEY_FILE}` | private key (PKCS#8 PEM, owner-only) |
| `{CERT_FILE}` | leaf certificate |
| `{FULL_CHAIN_FILE}` | leaf followed by the root |
| `{PKCS12_FILE}` | key, leaf and root in a password-protected PKCS#12 |

### nginx

```nginx
ssl_certificate     /path/to/{FULL_CHAIN_FILE};
ssl_certificate_key /path/to/{PRIVATE_KEY_FILE};
```

### Apache httpd

```apache
SSLCertificateFile    /path/to/{FULL_CHAIN_FILE}
SSLCertificateKeyFile /path/to/{PRIVATE_KEY_FILE}
```

### HAProxy

HAProxy wants key and chain in one file:

```sh
cat {FULL_CHAIN_FILE} {PRIVATE_KEY_FILE} > haproxy.pem
```

### IIS and Java

Import `{PKCS12_FILE}` with the password chosen at issuance, for example:

```sh
keytool -importkeystore -srckeystore {PKCS12_FILE} -srcstoretype PKCS12 \
  -destkeystore server.jks
```

## Renewal

Renewing reissues: a new key and a new certificate replace the directory
contents. Nothing is revoked, so redeploy the new files everywhere the old
ones were used. Re-initializing the root invalidates every certificate
issued before it.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_at_store_paths() {
        let store = PkiStore::new("/srv/pki");
        let guide = render(&store);
        assert!(guide.contains("/srv/pki/root_ca/rootCA.crt"));
        assert!(guide.contains("ssl_certificate     /path/to/fullchain.pem;"));
        assert!(guide.contains("bundle.p12"));
    }
}
