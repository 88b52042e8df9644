mod engine;

use crate::engine::core::app_setup::create_app;
use crate::engine::core::cli::LaunchOptions;

fn main() {
    #[cfg(not(target_arch = "wasm32"))]
    let options = {
        use clap::Parser;
        LaunchOptions::parse()
    };

    #[cfg(target_arch = "wasm32")]
    let options = LaunchOptions::default();

    let mut app = create_app(options);

    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(async move {
            app.run();
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        app.run();
    }
}
