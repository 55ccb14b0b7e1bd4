use std::time::Duration;

use extstore::{StorageService, StoreConfig, StorageError, ValueOrUpdate};
use tokio::time::sleep;

/// Two independent "contexts" (think: a background task and a popup) sharing
/// one theme value through the host store. The popup never writes; it only
/// observes what the background context does, via live update.
#[tokio::main]
async fn main() -> Result<(), StorageError> {
    env_logger::init();

    // One host store represents the platform; each context binds its own
    // service and handle to it.
    let background = StorageService::in_memory();
    let popup = StorageService::new(background.host());

    let config = || StoreConfig::<String>::default().with_live_update(true);
    let bg_theme = background.create_store("theme", "light".to_string(), config())?;
    let popup_theme = popup.create_store("theme", "light".to_string(), config())?;

    // The popup "renders" by re-reading its snapshot whenever notified.
    let render_source = popup_theme.clone();
    let _sub = popup_theme.subscribe(move || {
        match render_source.snapshot() {
            Some(theme) => println!("[popup] rendering with theme: {theme}"),
            None => println!("[popup] still loading"),
        }
    });

    bg_theme.primed().await;
    popup_theme.primed().await;
    println!("[background] initial theme: {:?}", bg_theme.snapshot());

    // The background flips the theme; the popup hears about it through the
    // host change stream without ever calling get or set itself.
    bg_theme.set("dark".to_string()).await?;
    sleep(Duration::from_millis(50)).await;

    bg_theme
        .set(ValueOrUpdate::update(|prev: String| {
            if prev == "dark" { "light".into() } else { "dark".into() }
        }))
        .await?;
    sleep(Duration::from_millis(50)).await;

    println!("[background] final theme: {:?}", bg_theme.snapshot());
    println!("[popup]      final theme: {:?}", popup_theme.snapshot());

    Ok(())
}
