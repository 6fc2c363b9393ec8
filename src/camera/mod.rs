use log::info;

use crate::video::CaptureSession;

/// 調べるカメラindexの数（0〜3）
pub const MAX_CAMERAS: i32 = 4;

/// index 0..MAX_CAMERAS を順に開いてみて、使えるものを返す
///
/// `probe` は開けたら true を返し、その場で解放すること。
pub fn enumerate_cameras_with<F>(mut probe: F) -> Vec<i32>
where
    F: FnMut(i32) -> bool,
{
    (0..MAX_CAMERAS).filter(|&index| probe(index)).collect()
}

/// 接続されているカメラを検出
pub fn detect_cameras() -> Vec<i32> {
    let found = enumerate_cameras_with(CaptureSession::probe_camera);
    info!("{}", cameras_found_message(found.len()));
    found
}

pub fn cameras_found_message(count: usize) -> String {
    format!("{} camera(s) were found", count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probes_in_order_and_stops_at_four() {
        let mut probed = Vec::new();
        let found = enumerate_cameras_with(|i| {
            probed.push(i);
            true
        });
        assert_eq!(probed, vec![0, 1, 2, 3]);
        assert_eq!(found, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_skips_unavailable() {
        let found = enumerate_cameras_with(|i| i == 1 || i == 3);
        assert_eq!(found, vec![1, 3]);
    }

    #[test]
    fn test_single_camera() {
        let found = enumerate_cameras_with(|i| i == 0);
        assert_eq!(found, vec![0]);
        assert_eq!(cameras_found_message(found.len()), "1 camera(s) were found");
    }

    #[test]
    fn test_no_cameras_is_empty() {
        let found = enumerate_cameras_with(|_| false);
        assert!(found.is_empty());
        assert_eq!(cameras_found_message(0), "0 camera(s) were found");
    }
}
