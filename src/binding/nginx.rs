//! nginx server block templates.

use std::fmt::Write;

/// Certificate and key referenced by TLS server blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsFiles {
    pub certificate: String,
    pub private_key: String,
}

fn tls_lines(out: &mut String, tls: &TlsFiles) {
    let _ = writeln!(out, "    ssl_certificate {};", tls.certificate);
    let _ = writeln!(out, "    ssl_certificate_key {};", tls.private_key);
    out.push_str("    ssl_protocols TLSv1.3;\n");
    out.push_str("    ssl_ciphers HIGH:!aNULL:!MD5;\n");
}

/// HTTP(S) virtual host proxying to `protocol://ip:port`.
pub fn http_server(listen: &str, tls: Option<&TlsFiles>, domain: &str, protocol: &str, ip: &str, port: u16) -> String {
    let mut out = String::from("server {\n");
    match tls {
        Some(tls) => {
            let _ = writeln!(out, "    listen {listen} ssl;");
            tls_lines(&mut out, tls);
        }
        None => {
            let _ = writeln!(out, "    listen {listen};");
        }
    }
    let _ = writeln!(out, "    server_name {domain};");
    out.push_str("    location / {\n");
    let _ = writeln!(out, "        proxy_pass {protocol}://{ip}:{port};");
    out.push_str("        proxy_http_version 1.1;\n");
    out.push_str("        proxy_set_header Upgrade $http_upgrade;\n");
    out.push_str("        proxy_set_header Connection $http_connection;\n");
    out.push_str("    }\n}\n");
    out
}

/// Plain TCP stream proxy, optionally terminating TLS.
pub fn tcp_server(listen: &str, tls: Option<&TlsFiles>, ip: &str, port: u16) -> String {
    let mut out = String::from("server {\n");
    let _ = writeln!(out, "    listen {listen};");
    if let Some(tls) = tls {
        tls_lines(&mut out, tls);
    }
    let _ = writeln!(out, "    proxy_pass {ip}:{port};");
    out.push_str("}\n");
    out
}

/// UDP stream proxy.
pub fn udp_server(listen: &str, ip: &str, port: u16) -> String {
    format!("server {{\n    listen {listen} udp;\n    proxy_pass {ip}:{port};\n}}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tls() -> TlsFiles {
        TlsFiles {
            certificate: "/etc/ssl/site.crt".into(),
            private_key: "/etc/ssl/site.key".into(),
        }
    }

    #[test]
    fn test_https_block() {
        let block = http_server("0.0.0.0:443", Some(&tls()), "example.org", "http", "127.0.0.1", 8080);
        assert_eq!(
            block,
            "server {
    listen 0.0.0.0:443 ssl;
    ssl_certificate /etc/ssl/site.crt;
    ssl_certificate_key /etc/ssl/site.key;
    ssl_protocols TLSv1.3;
    ssl_ciphers HIGH:!aNULL:!MD5;
    server_name example.org;
    location / {
        proxy_pass http://127.0.0.1:8080;
        proxy_http_version 1.1;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection $http_connection;
    }
}
"
        );
    }

    #[test]
    fn test_plain_http_has_no_tls() {
        let block = http_server("0.0.0.0:80", None, "example.org", "http", "0.0.0.0", 8080);
        assert!(block.contains("listen 0.0.0.0:80;\n"));
        assert!(!block.contains("ssl"));
    }

    #[test]
    fn test_stream_blocks() {
        assert_eq!(
            tcp_server("0.0.0.0:5432", None, "0.0.0.0", 15432),
            "server {\n    listen 0.0.0.0:5432;\n    proxy_pass 0.0.0.0:15432;\n}\n"
        );
        assert!(tcp_server("0.0.0.0:5432", Some(&tls()), "0.0.0.0", 15432).contains("ssl_certificate /etc/ssl/site.crt;"));
        assert_eq!(
            udp_server("0.0.0.0:53", "127.0.0.1", 5353),
            "server {\n    listen 0.0.0.0:53 udp;\n    proxy_pass 127.0.0.1:5353;\n}\n"
        );
    }
}
