use crate::error::FormError;

/// 画素のチャンネル順
///
/// 推定器は RGB、OpenCV のキャプチャ/ライタは BGR を前提とする。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// RGB色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// 0xRRGGBB から変換
    pub const fn from_u32(value: u32) -> Self {
        Self((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }
}

/// 1フレーム分の画素バッファ (width x height x 3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Result<Self, FormError> {
        if data.len() != width as usize * height as usize * 3 {
            return Err(FormError::InvalidFrame {
                width,
                height,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            order,
            data,
        })
    }

    /// 単色で塗りつぶしたフレーム
    pub fn filled(width: u32, height: u32, order: ChannelOrder, color: Rgb) -> Self {
        let px = match order {
            ChannelOrder::Rgb => [color.0, color.1, color.2],
            ChannelOrder::Bgr => [color.2, color.1, color.0],
        };
        let data = px
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            order,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// チャンネル順を変換（R と B の入れ替え）
    pub fn into_order(mut self, order: ChannelOrder) -> Self {
        if self.order != order {
            for px in self.data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            self.order = order;
        }
        self
    }

    /// (x, y) の画素を RGB で取得
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        let (a, b, c) = (self.data[i], self.data[i + 1], self.data[i + 2]);
        Some(match self.order {
            ChannelOrder::Rgb => Rgb(a, b, c),
            ChannelOrder::Bgr => Rgb(c, b, a),
        })
    }

    /// ピクセルをセット（境界チェック付き）
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        let px = match self.order {
            ChannelOrder::Rgb => [color.0, color.1, color.2],
            ChannelOrder::Bgr => [color.2, color.1, color.0],
        };
        self.data[i..i + 3].copy_from_slice(&px);
    }

    /// 円を描画（塗りつぶし）
    pub fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: Rgb) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// Bresenhamのアルゴリズムで線を描画。thickness > 1 なら各点に円を打つ
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, thickness: i32, color: Rgb) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let radius = (thickness / 2).max(0);

        let mut x = x0;
        let mut y = y0;

        loop {
            if radius == 0 {
                self.set_pixel(x, y, color);
            } else {
                self.draw_circle(x, y, radius, color);
            }

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(Frame::new(2, 2, ChannelOrder::Rgb, vec![0; 12]).is_ok());
        assert!(matches!(
            Frame::new(2, 2, ChannelOrder::Rgb, vec![0; 11]),
            Err(FormError::InvalidFrame { actual: 11, .. })
        ));
    }

    #[test]
    fn test_into_order_swaps_channels() {
        let frame = Frame::new(1, 1, ChannelOrder::Bgr, vec![10, 20, 30]).unwrap();
        let rgb = frame.clone().into_order(ChannelOrder::Rgb);
        assert_eq!(rgb.data(), &[30, 20, 10]);
        assert_eq!(rgb.pixel(0, 0), frame.pixel(0, 0));
        // 同じ順序なら変化なし
        assert_eq!(rgb.clone().into_order(ChannelOrder::Rgb), rgb);
    }

    #[test]
    fn test_set_pixel_respects_order() {
        let mut frame = Frame::filled(2, 2, ChannelOrder::Bgr, Rgb(0, 0, 0));
        frame.set_pixel(1, 0, Rgb(255, 0, 0));
        assert_eq!(&frame.data()[3..6], &[0, 0, 255]);
        assert_eq!(frame.pixel(1, 0), Some(Rgb(255, 0, 0)));
    }

    #[test]
    fn test_set_pixel_out_of_bounds_is_ignored() {
        let mut frame = Frame::filled(2, 2, ChannelOrder::Rgb, Rgb(1, 2, 3));
        let before = frame.clone();
        frame.set_pixel(-1, 0, Rgb(255, 255, 255));
        frame.set_pixel(0, 2, Rgb(255, 255, 255));
        assert_eq!(frame, before);
    }

    #[test]
    fn test_draw_line_endpoints() {
        let mut frame = Frame::filled(10, 10, ChannelOrder::Rgb, Rgb(0, 0, 0));
        let white = Rgb(255, 255, 255);
        frame.draw_line(1, 1, 8, 5, 1, white);
        assert_eq!(frame.pixel(1, 1), Some(white));
        assert_eq!(frame.pixel(8, 5), Some(white));
        assert_eq!(frame.pixel(0, 9), Some(Rgb(0, 0, 0)));
    }

    #[test]
    fn test_draw_circle_radius() {
        let mut frame = Frame::filled(9, 9, ChannelOrder::Rgb, Rgb(0, 0, 0));
        let red = Rgb::from_u32(0xFF0000);
        frame.draw_circle(4, 4, 2, red);
        assert_eq!(frame.pixel(4, 4), Some(red));
        assert_eq!(frame.pixel(6, 4), Some(red));
        assert_eq!(frame.pixel(7, 4), Some(Rgb(0, 0, 0)));
        assert_eq!(frame.pixel(6, 6), Some(Rgb(0, 0, 0)));
    }
}
