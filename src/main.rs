mod annotate;
mod barcode_decoders;
mod barcode_scanner;
mod camera;
mod config;
mod ui;

fn main() {
    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("starting barcode reader");

    ui::show_ui().expect("could not display ui");
}
