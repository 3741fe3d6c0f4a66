//! Deployment files: `vercel.json`, `serve.sh` and `README.md`.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use serde_json::{Value, json};
use url::Url;

use crate::asset::{Category, Inventory, bucket_totals};
use crate::config::CloneConfig;
use crate::core::RoutePath;
use crate::log;
use crate::utils::mime::types::JAVASCRIPT;
use crate::utils::path::{display_relative, write_file};

/// Write every deployment file for the bundle under `config.output`.
pub fn emit(
    config: &CloneConfig,
    source: &Url,
    routes: &[RoutePath],
    inventory: &Inventory,
) -> Result<()> {
    let paths = config.paths();
    let port = config.serve.port;

    let vercel = vercel_json(inventory, config.deploy.cache_max_age);
    write_file(
        &paths.vercel_json(),
        serde_json::to_string_pretty(&vercel)? + "\n",
    )?;

    let serve_sh = paths.serve_sh();
    write_file(&serve_sh, serve_script(source, routes, port))?;
    make_executable(&serve_sh)?;

    let mut written = vec![paths.vercel_json(), serve_sh];
    if config.deploy.readme {
        write_file(&paths.readme(), readme(source, routes, inventory, port))?;
        written.push(paths.readme());
    }

    for path in &written {
        log!("deploy"; "{}", display_relative(path, paths.root()));
    }
    Ok(())
}

/// Vercel project config, with `public/` as the root directory.
///
/// Only buckets that hold downloaded files get a cache rule.
pub fn vercel_json(inventory: &Inventory, max_age: u64) -> Value {
    let cache = format!("public, max-age={max_age}, immutable");
    let mut headers: Vec<Value> = Category::ALL
        .iter()
        .filter(|c| c.is_immutable())
        .filter(|c| inventory.get(*c).is_some_and(|r| bucket_totals(r).0 > 0))
        .map(|c| {
            json!({
                "source": format!("/assets/{}/(.*)", c.bucket()),
                "headers": [{ "key": "Cache-Control", "value": cache }],
            })
        })
        .collect();

    headers.push(json!({
        "source": "/(.*).mjs",
        "headers": [{ "key": "Content-Type", "value": JAVASCRIPT }],
    }));

    json!({
        "version": 2,
        "public": true,
        "cleanUrls": true,
        "trailingSlash": false,
        "headers": headers,
    })
}

/// `serve.sh`: prefers the built-in server, falls back to Python.
pub fn serve_script(source: &Url, routes: &[RoutePath], port: u16) -> String {
    let mut script = String::from("#!/bin/sh\n");
    let _ = writeln!(script, "# Static clone of {source}");
    script.push_str("cd \"$(dirname \"$0\")\" || exit 1\n\n");

    script.push_str("echo \"Routes:\"\n");
    for route in routes {
        let _ = writeln!(script, "echo \"  http://localhost:{port}{}\"", route.to_encoded());
    }
    script.push('\n');

    script.push_str("if command -v framer-clone >/dev/null 2>&1; then\n");
    let _ = writeln!(script, "  exec framer-clone serve -o . -p {port}");
    script.push_str("fi\n\n");

    script.push_str("cd public || exit 1\n");
    let _ = writeln!(script, "echo \"Site running at http://localhost:{port}\"");
    let _ = writeln!(script, "exec python3 -m http.server {port}");
    script
}

pub fn readme(source: &Url, routes: &[RoutePath], inventory: &Inventory, port: u16) -> String {
    let mut text = String::from("# Framer Site Clone\n\n");
    let _ = writeln!(text, "Static clone of **{source}**\n");

    text.push_str("## Routes\n\n");
    for route in routes {
        let _ = writeln!(text, "- `{route}`");
    }
    text.push('\n');

    let assets: Vec<String> = inventory
        .iter()
        .map(|(category, records)| (category, bucket_totals(records).0))
        .filter(|(_, count)| *count > 0)
        .map(|(category, count)| format!("- **{category}**: {count}"))
        .collect();
    if !assets.is_empty() {
        text.push_str("## Assets\n\n");
        text.push_str(&assets.join("\n"));
        text.push_str("\n\n");
    }

    let _ = write!(
        text,
        "## Run locally

```bash
./serve.sh
# or
cd public && python3 -m http.server {port}
```

Open http://localhost:{port}

## Deploy on Vercel

### CLI
```bash
npm i -g vercel && vercel
```
Set the root directory to `public`.

### GitHub
Push to GitHub, import in Vercel, set the root directory to `public`.

## Re-capture

```bash
framer-clone clone {source} -o .
```

Only the local steps:

```bash
framer-clone localize -o .   # re-download assets from capture/
framer-clone verify -o .     # re-run the parity check
```

## Parity

See [PARITY_REPORT.md](PARITY_REPORT.md) and `parity/screenshots/`.
"
    );
    text
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use anyhow::Context;
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
