//! images, pairwise warp fields, and loading a repeatability dataset
//! from one of three on-disk layouts: Cambridge (plain-text warps),
//! Cambridge with PNG-encoded warps, or VGG (homography-derived warps).
//!
//! Ported from `original_source/load_data.cc`: `load_images_cambridge`,
//! `load_images_vgg`, `load_warps_cambridge`, `load_warps_cambridge_png`,
//! `load_warps_vgg`, and `prune_warps`.

use std::path::{Path, PathBuf};

use crate::bytecode::FlatImage;
use crate::error::{ConfigError, DatasetError};
use crate::warp_png;

/// The sentinel warp destination: "this pixel does not map into the
/// destination image".
pub const SENTINEL: (f32, f32) = (-1.0, -1.0);

/// A pixel-to-pixel warp field from one image to another: `get(x, y)` is
/// the real-valued destination coordinate, or [`SENTINEL`].
#[derive(Debug, Clone)]
pub struct WarpField {
    pub width: i32,
    pub height: i32,
    pub values: Vec<(f32, f32)>,
}

impl WarpField {
    pub fn filled(width: i32, height: i32, value: (f32, f32)) -> Self {
        WarpField {
            width,
            height,
            values: vec![value; (width as usize) * (height as usize)],
        }
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn get(&self, x: i32, y: i32) -> (f32, f32) {
        self.values[self.index(x, y)]
    }

    pub fn set(&mut self, x: i32, y: i32, v: (f32, f32)) {
        let idx = self.index(x, y);
        self.values[idx] = v;
    }

    pub fn is_sentinel(v: (f32, f32)) -> bool {
        v.0 < 0.0 || v.1 < 0.0
    }

    /// Replace any destination that rounds outside `[0, width) x [0,
    /// height)` with [`SENTINEL`], per `prune_warps`. This lets the
    /// repeatability scorer skip a bounds check on every access.
    pub fn prune(&mut self, width: i32, height: i32) {
        for v in self.values.iter_mut() {
            if Self::is_sentinel(*v) {
                continue;
            }
            let (x, y) = (v.0.round() as i32, v.1.round() as i32);
            if x < 0 || y < 0 || x >= width || y >= height {
                *v = SENTINEL;
            }
        }
    }
}

/// Which of the three on-disk dataset layouts to read, named by the
/// `repeatability_dataset.format` configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Cambridge,
    CamPng,
    Vgg,
}

impl DatasetFormat {
    pub fn parse(s: &str) -> Result<DatasetFormat, ConfigError> {
        match s {
            "cambridge" => Ok(DatasetFormat::Cambridge),
            "cam-png" => Ok(DatasetFormat::CamPng),
            "vgg" => Ok(DatasetFormat::Vgg),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }
}

/// A loaded set of same-size images plus the `n x n` table of pairwise
/// warps between them (diagonal entries unused).
#[derive(Debug, Clone)]
pub struct Dataset {
    pub images: Vec<FlatImage>,
    pub warps: Vec<Vec<Option<WarpField>>>,
}

impl Dataset {
    pub fn size(&self) -> (i32, i32) {
        (self.images[0].width, self.images[0].height)
    }

    /// Load a dataset of `num` images from `dir` in the given `format`.
    pub fn load(dir: &Path, num: usize, format: DatasetFormat) -> Result<Dataset, DatasetError> {
        let images = match format {
            DatasetFormat::Cambridge | DatasetFormat::CamPng => load_images_cambridge(dir, num)?,
            DatasetFormat::Vgg => load_images_vgg(dir, num)?,
        };

        if images.is_empty() {
            return Err(DatasetError::Empty);
        }
        let (w, h) = (images[0].width, images[0].height);
        for (i, im) in images.iter().enumerate() {
            if im.width != w || im.height != h {
                return Err(DatasetError::ImageSizeMismatch {
                    path: image_path_cambridge(dir, i),
                    found: (im.width as u32, im.height as u32),
                    expected: (w as u32, h as u32),
                });
            }
        }

        let warps = match format {
            DatasetFormat::Cambridge => load_warps_cambridge_text(dir, num, w, h)?,
            DatasetFormat::CamPng => load_warps_cambridge_png(dir, num, w, h)?,
            DatasetFormat::Vgg => load_warps_vgg(dir, num, w, h)?,
        };

        Ok(Dataset { images, warps })
    }

    /// Prune every warp entry that rounds outside its destination image, in
    /// place, per `prune_warps`.
    pub fn prune(&mut self) {
        let (w, h) = self.size();
        for row in self.warps.iter_mut() {
            for warp in row.iter_mut().flatten() {
                warp.prune(w, h);
            }
        }
    }
}

fn image_path_cambridge(dir: &Path, i: usize) -> PathBuf {
    dir.join("frames").join(format!("frame_{}.pgm", i))
}

fn image_path_vgg(dir: &Path, i: usize) -> PathBuf {
    dir.join(format!("img{}.ppm", i))
}

fn load_image(path: &Path) -> Result<FlatImage, DatasetError> {
    let img = image::open(path).map_err(|e| DatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    })?;
    let gray = img.to_luma8();
    let (w, h) = (gray.width() as i32, gray.height() as i32);
    Ok(FlatImage::new(w, h, gray.into_raw()))
}

fn load_images_cambridge(dir: &Path, n: usize) -> Result<Vec<FlatImage>, DatasetError> {
    (0..n).map(|i| load_image(&image_path_cambridge(dir, i))).collect()
}

fn load_images_vgg(dir: &Path, n: usize) -> Result<Vec<FlatImage>, DatasetError> {
    // VGG frames are 1-indexed on disk.
    (1..=n).map(|i| load_image(&image_path_vgg(dir, i))).collect()
}

fn warp_path_cambridge_text(dir: &Path, from: usize, to: usize) -> PathBuf {
    dir.join("warps").join(format!("warp_{}_{}.warp", from, to))
}

fn warp_path_cambridge_png(dir: &Path, from: usize, to: usize) -> PathBuf {
    dir.join("pngwarps").join(format!("warp_{}_{}.png", from, to))
}

fn load_warps_cambridge_text(
    dir: &Path,
    n: usize,
    width: i32,
    height: i32,
) -> Result<Vec<Vec<Option<WarpField>>>, DatasetError> {
    let mut warps = vec![vec![None; n]; n];
    for from in 0..n {
        for to in 0..n {
            if from == to {
                continue;
            }
            let path = warp_path_cambridge_text(dir, from, to);
            let text = std::fs::read_to_string(&path).map_err(|e| DatasetError::Io {
                path: path.clone(),
                source: e,
            })?;
            let mut field = WarpField::filled(width, height, SENTINEL);
            let expected = (width as usize) * (height as usize);
            let mut tokens = text.split_whitespace();
            for i in 0..expected {
                let x: f32 = tokens
                    .next()
                    .ok_or(DatasetError::TruncatedWarp { path: path.clone(), found: i, expected })?
                    .parse()
                    .map_err(|_| DatasetError::TruncatedWarp { path: path.clone(), found: i, expected })?;
                let y: f32 = tokens
                    .next()
                    .ok_or(DatasetError::TruncatedWarp { path: path.clone(), found: i, expected })?
                    .parse()
                    .map_err(|_| DatasetError::TruncatedWarp { path: path.clone(), found: i, expected })?;
                field.values[i] = (x, y);
            }
            warps[from][to] = Some(field);
        }
    }
    Ok(warps)
}

fn load_warps_cambridge_png(
    dir: &Path,
    n: usize,
    width: i32,
    height: i32,
) -> Result<Vec<Vec<Option<WarpField>>>, DatasetError> {
    let mut warps = vec![vec![None; n]; n];
    for from in 0..n {
        for to in 0..n {
            if from == to {
                continue;
            }
            let path = warp_path_cambridge_png(dir, from, to);
            let bytes = std::fs::read(&path).map_err(|e| DatasetError::Io {
                path: path.clone(),
                source: e,
            })?;
            let field = warp_png::decode(&bytes)?;
            if field.width != width || field.height != height {
                return Err(DatasetError::WarpSizeMismatch {
                    path,
                    found: (field.width as u32, field.height as u32),
                    expected: (width as u32, height as u32),
                });
            }
            warps[from][to] = Some(field);
        }
    }
    Ok(warps)
}

// --- VGG homography-based warps -------------------------------------------

/// A 3x3 matrix, stored row-major, just enough linear algebra for
/// homography inversion and composition (the original links TooN; a
/// hand-rolled 3x3 solve avoids pulling in a full linear-algebra crate for
/// this one use).
#[derive(Debug, Clone, Copy)]
struct Mat3([[f64; 3]; 3]);

impl Mat3 {
    fn identity() -> Mat3 {
        Mat3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    fn mul(&self, rhs: &Mat3) -> Mat3 {
        let mut out = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                let mut s = 0.0;
                for k in 0..3 {
                    s += self.0[i][k] * rhs.0[k][j];
                }
                out[i][j] = s;
            }
        }
        Mat3(out)
    }

    fn determinant(&self) -> f64 {
        let m = &self.0;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    fn invert(&self, index: usize) -> Result<Mat3, DatasetError> {
        let m = &self.0;
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return Err(DatasetError::SingularHomography(index));
        }
        let inv_det = 1.0 / det;
        let cofactor = |r0: usize, r1: usize, c0: usize, c1: usize| {
            m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
        };
        let adj = [
            [cofactor(1, 2, 1, 2), cofactor(0, 2, 1, 2) * -1.0, cofactor(0, 1, 1, 2)],
            [cofactor(1, 2, 0, 2) * -1.0, cofactor(0, 2, 0, 2), cofactor(0, 1, 0, 2) * -1.0],
            [cofactor(1, 2, 0, 1), cofactor(0, 2, 0, 1) * -1.0, cofactor(0, 1, 0, 1)],
        ];
        // adj above is the cofactor matrix already transposed (adjugate);
        // scale by 1/det to get the inverse.
        let mut out = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                out[i][j] = adj[i][j] * inv_det;
            }
        }
        Ok(Mat3(out))
    }

    fn project(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.0;
        let px = m[0][0] * x + m[0][1] * y + m[0][2];
        let py = m[1][0] * x + m[1][1] * y + m[1][2];
        let pw = m[2][0] * x + m[2][1] * y + m[2][2];
        (px / pw, py / pw)
    }
}

fn parse_homography(path: &Path) -> Result<Mat3, DatasetError> {
    let text = std::fs::read_to_string(path).map_err(|e| DatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let values: Vec<f64> = text
        .split_whitespace()
        .map(|t| t.parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| DatasetError::MalformedHomography(path.to_path_buf()))?;
    if values.len() != 9 {
        return Err(DatasetError::MalformedHomography(path.to_path_buf()));
    }
    Ok(Mat3([
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5]],
        [values[6], values[7], values[8]],
    ]))
}

fn load_warps_vgg(
    dir: &Path,
    n: usize,
    width: i32,
    height: i32,
) -> Result<Vec<Vec<Option<WarpField>>>, DatasetError> {
    // H_1_to_x[0] is the identity (image 1 to itself); H_1_to_x[k] for k>=1
    // comes from `H1to<k+2>p` on disk (files are 2-indexed; image 1 never
    // has a file since it's the reference).
    let mut h_1_to_x = vec![Mat3::identity()];
    for i in 2..=n {
        let path = dir.join(format!("H1to{}p", i));
        h_1_to_x.push(parse_homography(&path)?);
    }

    let mut warps = vec![vec![None; n]; n];
    for from in 0..n {
        for to in 0..n {
            if from == to {
                continue;
            }
            let from_to_one = h_1_to_x[from].invert(from)?;
            let one_to_to = h_1_to_x[to];
            let from_to_to = one_to_to.mul(&from_to_one);

            let mut field = WarpField::filled(width, height, SENTINEL);
            for y in 0..height {
                for x in 0..width {
                    let (px, py) = from_to_to.project(x as f64, y as f64);
                    if px >= 0.0 && py >= 0.0 && px <= (width - 1) as f64 && py <= (height - 1) as f64 {
                        field.set(x, y, (px as f32, py as f32));
                    }
                }
            }
            warps[from][to] = Some(field);
        }
    }
    Ok(warps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_recognized_names() {
        assert_eq!(DatasetFormat::parse("cambridge").unwrap(), DatasetFormat::Cambridge);
        assert_eq!(DatasetFormat::parse("cam-png").unwrap(), DatasetFormat::CamPng);
        assert_eq!(DatasetFormat::parse("vgg").unwrap(), DatasetFormat::Vgg);
        assert!(DatasetFormat::parse("nonsense").is_err());
    }

    #[test]
    fn prune_replaces_out_of_bounds_destinations() {
        let mut field = WarpField::filled(4, 4, (0.0, 0.0));
        field.set(0, 0, (3.6, 1.0)); // rounds to (4, 1), out of [0,4)
        field.set(1, 0, (2.4, 1.0)); // rounds to (2, 1), in bounds
        field.prune(4, 4);
        assert_eq!(field.get(0, 0), SENTINEL);
        assert_eq!(field.get(1, 0), (2.4, 1.0));
    }

    #[test]
    fn sentinel_is_recognized_in_either_coordinate() {
        assert!(WarpField::is_sentinel((-1.0, -1.0)));
        assert!(WarpField::is_sentinel((-1.0, 5.0)));
        assert!(!WarpField::is_sentinel((0.0, 0.0)));
    }

    #[test]
    fn mat3_identity_inverts_to_itself() {
        let m = Mat3::identity();
        let inv = m.invert(0).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((inv.0[i][j] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn mat3_project_applies_homography() {
        // A pure translation homography: x' = x+2, y' = y+3.
        let m = Mat3([[1.0, 0.0, 2.0], [0.0, 1.0, 3.0], [0.0, 0.0, 1.0]]);
        let (x, y) = m.project(5.0, 5.0);
        assert!((x - 7.0).abs() < 1e-9);
        assert!((y - 8.0).abs() < 1e-9);
    }

    #[test]
    fn mat3_singular_reports_error() {
        let zero = Mat3([[0.0; 3]; 3]);
        assert!(matches!(zero.invert(3), Err(DatasetError::SingularHomography(3))));
    }

    #[test]
    fn load_reads_a_cambridge_layout_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("frames")).unwrap();
        std::fs::create_dir_all(dir.path().join("warps")).unwrap();

        let (w, h) = (4, 3);
        for i in 0..2 {
            let pixels: Vec<u8> = (0..(w * h) as u8).map(|p| p.wrapping_add(i * 10)).collect();
            image::save_buffer_with_format(
                dir.path().join("frames").join(format!("frame_{}.pgm", i)),
                &pixels,
                w as u32,
                h as u32,
                image::ColorType::L8,
                image::ImageFormat::Pnm,
            )
            .unwrap();
        }

        let mut warp_text = String::new();
        for _ in 0..(w * h) {
            warp_text.push_str("1.0 1.0 ");
        }
        std::fs::write(dir.path().join("warps").join("warp_0_1.warp"), &warp_text).unwrap();
        std::fs::write(dir.path().join("warps").join("warp_1_0.warp"), &warp_text).unwrap();

        let dataset = Dataset::load(dir.path(), 2, DatasetFormat::Cambridge).unwrap();
        assert_eq!(dataset.images.len(), 2);
        assert_eq!(dataset.size(), (w, h));
        assert_eq!(dataset.warps[0][1].as_ref().unwrap().get(0, 0), (1.0, 1.0));
        assert!(dataset.warps[0][0].is_none());
    }

    #[test]
    fn load_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::load(&dir.path().join("nonexistent"), 2, DatasetFormat::Cambridge).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. } | DatasetError::Image { .. }));
    }
}
