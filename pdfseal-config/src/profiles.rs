use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, SizeSetting};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePosition {
    pub x: f64,
    pub y: f64,
}

/// 持久化的签名位置、尺寸与旋转（页面空间，PDF 点）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignatureProfile {
    pub position: ProfilePosition,
    pub size: SizeSetting,
    #[serde(default)]
    pub rotation: f64,
}

impl SignatureProfile {
    pub fn validate(&self) -> Result<(), String> {
        let SizeSetting { width, height } = self.size;
        if !(width > 0.0 && height > 0.0) {
            return Err(format!("尺寸必须为正数: {width}x{height}"));
        }
        let ProfilePosition { x, y } = self.position;
        if !(x >= 0.0 && y >= 0.0) {
            return Err(format!("位置不能为负: ({x}, {y})"));
        }
        if !(-360.0..=360.0).contains(&self.rotation) {
            return Err(format!("旋转角超出 [-360, 360]: {}", self.rotation));
        }
        Ok(())
    }
}

/// 以 ID 索引的签名配置集合。插入与加载时都会校验。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureProfiles {
    #[serde(default)]
    profiles: BTreeMap<String, SignatureProfile>,
}

impl SignatureProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let profiles: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        for (id, profile) in &profiles.profiles {
            profile.validate().map_err(|reason| ConfigError::InvalidProfile {
                id: id.clone(),
                reason,
            })?;
        }
        Ok(profiles)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 插入或覆盖，返回旧值。
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        profile: SignatureProfile,
    ) -> Result<Option<SignatureProfile>, ConfigError> {
        let id = id.into();
        profile
            .validate()
            .map_err(|reason| ConfigError::InvalidProfile {
                id: id.clone(),
                reason,
            })?;
        Ok(self.profiles.insert(id, profile))
    }

    pub fn get(&self, id: &str) -> Option<&SignatureProfile> {
        self.profiles.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<SignatureProfile> {
        self.profiles.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SignatureProfile)> + '_ {
        self.profiles.iter().map(|(id, profile)| (id.as_str(), profile))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
