use form_trainer::camera::{cameras_found_message, enumerate_cameras_with, MAX_CAMERAS};
use form_trainer::pipeline::FrameSource;
use form_trainer::video::CaptureSession;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("=== Camera probe (index 0..{}) ===", MAX_CAMERAS - 1);

    let found = enumerate_cameras_with(|index| {
        print!("index {}: ", index);
        let mut camera = match CaptureSession::open_camera(index) {
            Ok(c) => c,
            Err(e) => {
                println!("{}", e);
                return false;
            }
        };

        let props = camera.properties();
        println!(
            "{}x{} fps={} backend={}",
            props.width,
            props.height,
            props.fps,
            camera.backend_name()
        );

        match camera.read_frame() {
            Ok(Some(frame)) => println!("       frame: {}x{} {:?}", frame.width(), frame.height(), frame.order()),
            Ok(None) => println!("       frame: EMPTY"),
            Err(e) => println!("       frame err: {}", e),
        }
        camera.release();
        true
    });

    println!();
    println!("{}", cameras_found_message(found.len()));
}
