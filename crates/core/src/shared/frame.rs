use ndarray::ArrayView3;

/// Width and height of a frame in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A single captured frame: contiguous interleaved 8-bit pixels in row-major order.
///
/// `channels` is 3 for RGB and 4 for RGBA. Format conversion happens at the
/// capture boundary only; filters treat channels uniformly.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// A frame of the given geometry with every byte set to `value`.
    pub fn filled(width: u32, height: u32, channels: u8, value: u8, index: usize) -> Self {
        let len = (width as usize) * (height as usize) * (channels as usize);
        Self::new(vec![value; len], width, height, channels, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    /// Bytes of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels as usize;
        let offset = (y as usize * self.width as usize + x as usize) * c;
        &self.data[offset..offset + c]
    }

    /// Same geometry and index, different pixel bytes.
    pub fn with_data(&self, data: Vec<u8>) -> Self {
        Self::new(data, self.width, self.height, self.channels, self.index)
    }

    /// Top-left aligned crop to `extent`.
    ///
    /// Returns `None` when `extent` is larger than the frame in either dimension.
    pub fn cropped(self, extent: Extent) -> Option<Self> {
        if extent.width > self.width || extent.height > self.height {
            return None;
        }
        if extent == self.extent() {
            return Some(self);
        }
        let c = self.channels as usize;
        let src_row = self.width as usize * c;
        let dst_row = extent.width as usize * c;
        let mut data = Vec::with_capacity(dst_row * extent.height as usize);
        for row in 0..extent.height as usize {
            let start = row * src_row;
            data.extend_from_slice(&self.data[start..start + dst_row]);
        }
        Some(Self::new(
            data,
            extent.width,
            extent.height,
            self.channels,
            self.index,
        ))
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
