//! Split a multipart file into its parts and print what was found.
//!
//! ```text
//! cargo run -p weft --example multipart_dump -- message.eml 'multipart/mixed; boundary=x'
//! ```

use std::{env, error::Error, fs, sync::Arc};

use tracing::info;
use tracing_subscriber::EnvFilter;
use weft::prelude::*;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = env::args().skip(1);
    let path = args.next().ok_or("usage: multipart_dump <file> [content-type]")?;
    let content_type = args.next().unwrap_or_else(|| "multipart/mixed".to_string());

    let resource = Resource::new(ResourceAttrs::new(content_type));
    for chunk in fs::read(&path)?.chunks(16 * 1024) {
        resource.write(chunk)?;
    }
    resource.finish();

    let mut decoder = resource.multipart(Arc::new(NullNotifier))?;
    while decoder.retrieve()?.more {}
    if let Some(kind) = decoder.failure() {
        return Err(format!("decoding failed: {kind:?}").into());
    }

    for part in decoder.parts() {
        let attrs = part.attributes();
        info!(
            index = part.index(),
            content_type = %attrs.media_type(),
            attachment = attrs.flag(FlagAttr::Attachment),
            filename = ?attrs.get(StringAttr::SuggestedFilename),
            bytes = part.store().len(),
            "part"
        );
    }
    Ok(())
}
