use facet_geom::Vec3;

/// One render stream: interleaved positions and normals plus a triangle list.
#[derive(Default, Clone, Debug)]
pub struct MeshBuild {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub idx: Vec<u32>,
}

impl MeshBuild {
    /// Clears all arrays but retains capacity for reuse across builds.
    #[inline]
    pub fn clear_keep_capacity(&mut self) {
        self.pos.clear();
        self.norm.clear();
        self.idx.clear();
    }

    #[inline]
    pub fn reserve(&mut self, vertices: usize, triangles: usize) {
        self.pos.reserve(vertices * 3);
        self.norm.reserve(vertices * 3);
        self.idx.reserve(triangles * 3);
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.idx.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    pub fn push_vertex(&mut self, p: Vec3, n: Vec3) -> u32 {
        let i = self.vertex_count() as u32;
        self.pos.extend_from_slice(&[p.x, p.y, p.z]);
        self.norm.extend_from_slice(&[n.x, n.y, n.z]);
        i
    }

    #[inline]
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.idx.extend_from_slice(&[a, b, c]);
    }

    /// Overwrites the normal of an already emitted vertex.
    #[inline]
    pub fn set_normal(&mut self, i: u32, n: Vec3) {
        let o = i as usize * 3;
        self.norm[o..o + 3].copy_from_slice(&[n.x, n.y, n.z]);
    }

    #[inline]
    pub fn position(&self, i: u32) -> Vec3 {
        let o = i as usize * 3;
        Vec3::new(self.pos[o], self.pos[o + 1], self.pos[o + 2])
    }

    #[inline]
    pub fn normal(&self, i: u32) -> Vec3 {
        let o = i as usize * 3;
        Vec3::new(self.norm[o], self.norm[o + 1], self.norm[o + 2])
    }

    /// Rolls the stream back to an earlier `mark`.
    pub fn truncate(&mut self, mark: StreamMark) {
        self.pos.truncate(mark.vertices * 3);
        self.norm.truncate(mark.vertices * 3);
        self.idx.truncate(mark.indices);
    }

    #[inline]
    pub fn mark(&self) -> StreamMark {
        StreamMark {
            vertices: self.vertex_count(),
            indices: self.idx.len(),
        }
    }

    /// Returns a slice of interleaved vertex positions (x,y,z per vertex).
    pub fn positions(&self) -> &[f32] {
        &self.pos
    }
    /// Returns a slice of interleaved vertex normals (x,y,z per vertex).
    pub fn normals(&self) -> &[f32] {
        &self.norm
    }
}

/// Positions-only stream used for physics.
#[derive(Default, Clone, Debug)]
pub struct CollisionBuild {
    pub pos: Vec<f32>,
    pub idx: Vec<u32>,
}

impl CollisionBuild {
    #[inline]
    pub fn clear_keep_capacity(&mut self) {
        self.pos.clear();
        self.idx.clear();
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.idx.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    pub fn push_vertex(&mut self, p: Vec3) -> u32 {
        let i = self.vertex_count() as u32;
        self.pos.extend_from_slice(&[p.x, p.y, p.z]);
        i
    }

    #[inline]
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.idx.extend_from_slice(&[a, b, c]);
    }

    #[inline]
    pub fn position(&self, i: u32) -> Vec3 {
        let o = i as usize * 3;
        Vec3::new(self.pos[o], self.pos[o + 1], self.pos[o + 2])
    }

    pub fn truncate(&mut self, mark: StreamMark) {
        self.pos.truncate(mark.vertices * 3);
        self.idx.truncate(mark.indices);
    }

    #[inline]
    pub fn mark(&self) -> StreamMark {
        StreamMark {
            vertices: self.vertex_count(),
            indices: self.idx.len(),
        }
    }
}

/// Stream length snapshot taken before a shape so a failed shape can be dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamMark {
    pub vertices: usize,
    pub indices: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_restores_mark() {
        let mut m = MeshBuild::default();
        let a = m.push_vertex(Vec3::ZERO, Vec3::FRONT);
        let mark = m.mark();
        let b = m.push_vertex(Vec3::new(1.0, 0.0, 0.0), Vec3::FRONT);
        let c = m.push_vertex(Vec3::new(0.0, 1.0, 0.0), Vec3::FRONT);
        m.push_triangle(a, b, c);
        assert_eq!(m.triangle_count(), 1);
        m.truncate(mark);
        assert_eq!(m.vertex_count(), 1);
        assert!(m.is_empty());
    }

    #[test]
    fn set_normal_overwrites_in_place() {
        let mut m = MeshBuild::default();
        let i = m.push_vertex(Vec3::ZERO, Vec3::FRONT);
        m.set_normal(i, -Vec3::FRONT);
        assert_eq!(m.normal(i), -Vec3::FRONT);
        assert_eq!(m.normals().len(), 3);
    }
}
