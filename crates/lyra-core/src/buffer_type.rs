use std::{
    fmt,
    ops::{Index, IndexMut},
};

/// Kind of media held by a source buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferType {
    Audio,
    Video,
    Text,
    Image,
}

impl BufferType {
    pub const ALL: [BufferType; 4] = [Self::Audio, Self::Video, Self::Text, Self::Image];

    const fn index(self) -> usize {
        match self {
            Self::Audio => 0,
            Self::Video => 1,
            Self::Text => 2,
            Self::Image => 3,
        }
    }

    /// Native types are decoded by the media element itself. A failure on
    /// one of them stops playback, while other types can be dropped.
    #[must_use]
    pub const fn is_native(self) -> bool {
        matches!(self, Self::Audio | Self::Video)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per [`BufferType`], stored in a fixed-size array.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PerType<T>([T; 4]);

impl<T> PerType<T> {
    pub fn from_fn(mut f: impl FnMut(BufferType) -> T) -> Self {
        Self(BufferType::ALL.map(&mut f))
    }

    pub fn get(&self, buffer_type: BufferType) -> &T {
        &self.0[buffer_type.index()]
    }

    pub fn get_mut(&mut self, buffer_type: BufferType) -> &mut T {
        &mut self.0[buffer_type.index()]
    }

    /// Replace the value for `buffer_type`, returning the previous one.
    pub fn replace(&mut self, buffer_type: BufferType, value: T) -> T {
        std::mem::replace(self.get_mut(buffer_type), value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BufferType, &T)> {
        BufferType::ALL.into_iter().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BufferType, &mut T)> {
        BufferType::ALL.into_iter().zip(self.0.iter_mut())
    }
}

impl<T> Index<BufferType> for PerType<T> {
    type Output = T;

    fn index(&self, buffer_type: BufferType) -> &T {
        self.get(buffer_type)
    }
}

impl<T> IndexMut<BufferType> for PerType<T> {
    fn index_mut(&mut self, buffer_type: BufferType) -> &mut T {
        self.get_mut(buffer_type)
    }
}
