//! Half-edge mesh data structure.
//!
//! This module provides a half-edge (doubly-connected edge list) representation
//! for triangle meshes, used as the connectivity substrate for atlas
//! generation. The structure enables O(1) adjacency queries.
//!
//! # Structure
//!
//! - Each edge is split into two **half-edges** pointing in opposite directions
//! - Each half-edge knows its **twin** (opposite half-edge), **next** (next half-edge
//!   around the face), **origin vertex**, and **incident face**
//! - Each vertex stores one outgoing half-edge and a colocal-group identifier
//! - Each face stores one half-edge on its boundary and a material tag
//!
//! # Colocal vertices
//!
//! Input meshes commonly duplicate vertices along authored UV or normal seams.
//! Such duplicates occupy the same position and must be treated as one point
//! topologically, while keeping their distinct attributes. The mesh records
//! this through a canonical id per vertex ([`Vertex::canonical`]); half-edge
//! twin pairing keys edges by canonical ids, so faces that only touch through
//! seam duplicates still become neighbors.
//!
//! # Construction protocol
//!
//! 1. [`HalfEdgeMesh::add_vertex`] for every vertex,
//! 2. [`HalfEdgeMesh::link_colocals_with_canonical_map`],
//! 3. [`HalfEdgeMesh::add_face`] for every face (a `None` return means the
//!    face would break manifoldness and was excluded),
//! 4. [`HalfEdgeMesh::link_boundary`] once, after the last face.
//!
//! The mesh is never structurally mutated after step 4.

use std::collections::HashMap;

use nalgebra::{Point2, Point3, Vector3};

use super::index::{FaceId, HalfEdgeId, MeshIndex, VertexId};

/// A vertex in the half-edge mesh.
#[derive(Debug, Clone)]
pub struct Vertex<I: MeshIndex = u32> {
    /// The 3D position of this vertex.
    pub position: Point3<f64>,

    /// The vertex normal. Seed data for the normal-seam metric; not
    /// recomputed by the pipeline.
    pub normal: Vector3<f64>,

    /// The input UV coordinate. Seed data for the texture-seam metric; the
    /// pipeline otherwise ignores it.
    pub tex: Point2<f64>,

    /// One outgoing half-edge from this vertex.
    /// For boundary vertices, this is guaranteed to be a boundary half-edge
    /// after [`HalfEdgeMesh::link_boundary`].
    pub halfedge: HalfEdgeId<I>,

    /// Colocal-group identifier: the lowest vertex id occupying the same
    /// position. Equal to the vertex's own id when it has no colocals.
    pub canonical: VertexId<I>,
}

impl<I: MeshIndex> Vertex<I> {
    /// Create a new vertex at the given position.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: Vector3::zeros(),
            tex: Point2::origin(),
            halfedge: HalfEdgeId::invalid(),
            canonical: VertexId::invalid(),
        }
    }
}

/// A half-edge in the mesh.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge<I: MeshIndex = u32> {
    /// The vertex this half-edge originates from.
    pub origin: VertexId<I>,

    /// The opposite half-edge (pointing in the reverse direction).
    /// Invalid until the edge is paired or [`HalfEdgeMesh::link_boundary`]
    /// creates its boundary twin.
    pub twin: HalfEdgeId<I>,

    /// The next half-edge around the face (counter-clockwise), or around the
    /// boundary loop for boundary half-edges.
    pub next: HalfEdgeId<I>,

    /// The previous half-edge around the face (clockwise).
    pub prev: HalfEdgeId<I>,

    /// The face this half-edge belongs to.
    /// Invalid for boundary half-edges.
    pub face: FaceId<I>,
}

impl<I: MeshIndex> HalfEdge<I> {
    /// Create a new uninitialized half-edge.
    pub fn new() -> Self {
        Self {
            origin: VertexId::invalid(),
            twin: HalfEdgeId::invalid(),
            next: HalfEdgeId::invalid(),
            prev: HalfEdgeId::invalid(),
            face: FaceId::invalid(),
        }
    }

    /// Check if this half-edge is on the boundary.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        !self.face.is_valid()
    }
}

impl<I: MeshIndex> Default for HalfEdge<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// A face in the half-edge mesh.
#[derive(Debug, Clone, Copy)]
pub struct Face<I: MeshIndex = u32> {
    /// One half-edge on the boundary of this face.
    pub halfedge: HalfEdgeId<I>,

    /// Material tag carried through from the input.
    pub material: i32,
}

impl<I: MeshIndex> Face<I> {
    /// Create a new face with the given half-edge.
    pub fn new(halfedge: HalfEdgeId<I>) -> Self {
        Self {
            halfedge,
            material: 0,
        }
    }
}

/// A half-edge mesh data structure for triangle meshes.
///
/// Vertices, half-edges, and faces live in index-addressed arenas; all links
/// are integer ids with a sentinel for "absent", which keeps the inherently
/// cyclic connectivity graph free of ownership cycles.
#[derive(Debug, Clone)]
pub struct HalfEdgeMesh<I: MeshIndex = u32> {
    pub(crate) vertices: Vec<Vertex<I>>,
    pub(crate) halfedges: Vec<HalfEdge<I>>,
    pub(crate) faces: Vec<Face<I>>,

    /// Directed edge (canonical origin, canonical dest) to half-edge, used to
    /// pair twins during insertion and to detect non-manifold edges.
    edge_map: HashMap<(VertexId<I>, VertexId<I>), HalfEdgeId<I>>,
}

impl<I: MeshIndex> Default for HalfEdgeMesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> HalfEdgeMesh<I> {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            halfedges: Vec::new(),
            faces: Vec::new(),
            edge_map: HashMap::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_faces: usize) -> Self {
        // Interior half-edges are 3 per face; boundary twins add a fringe.
        let num_halfedges = num_faces * 3 + num_faces / 2;
        Self {
            vertices: Vec::with_capacity(num_vertices),
            halfedges: Vec::with_capacity(num_halfedges),
            faces: Vec::with_capacity(num_faces),
            edge_map: HashMap::with_capacity(num_faces * 3),
        }
    }

    // ==================== Accessors ====================

    /// Get the number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of half-edges.
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    /// Get the number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Get a vertex by ID.
    #[inline]
    pub fn vertex(&self, id: VertexId<I>) -> &Vertex<I> {
        &self.vertices[id.index()]
    }

    /// Get a mutable vertex by ID.
    #[inline]
    pub fn vertex_mut(&mut self, id: VertexId<I>) -> &mut Vertex<I> {
        &mut self.vertices[id.index()]
    }

    /// Get a half-edge by ID.
    #[inline]
    pub fn halfedge(&self, id: HalfEdgeId<I>) -> &HalfEdge<I> {
        &self.halfedges[id.index()]
    }

    /// Get a mutable half-edge by ID.
    #[inline]
    pub fn halfedge_mut(&mut self, id: HalfEdgeId<I>) -> &mut HalfEdge<I> {
        &mut self.halfedges[id.index()]
    }

    /// Get a face by ID.
    #[inline]
    pub fn face(&self, id: FaceId<I>) -> &Face<I> {
        &self.faces[id.index()]
    }

    /// Get a mutable face by ID.
    #[inline]
    pub fn face_mut(&mut self, id: FaceId<I>) -> &mut Face<I> {
        &mut self.faces[id.index()]
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId<I>) -> &Point3<f64> {
        &self.vertex(v).position
    }

    /// Get the colocal-group identifier of a vertex.
    #[inline]
    pub fn canonical(&self, v: VertexId<I>) -> VertexId<I> {
        let c = self.vertex(v).canonical;
        if c.is_valid() {
            c
        } else {
            v
        }
    }

    // ==================== Topology Queries ====================

    /// Get the twin (opposite) half-edge.
    #[inline]
    pub fn twin(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).twin
    }

    /// Get the next half-edge around the face (or boundary loop).
    #[inline]
    pub fn next(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).next
    }

    /// Get the previous half-edge around the face (or boundary loop).
    #[inline]
    pub fn prev(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).prev
    }

    /// Get the origin vertex of a half-edge.
    #[inline]
    pub fn origin(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.halfedge(he).origin
    }

    /// Get the destination vertex record of a half-edge.
    ///
    /// For an in-face half-edge this is the origin of `next` (the record used
    /// by this face), which across a seam differs from `origin(twin)`.
    pub fn dest(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        let n = self.halfedge(he).next;
        if n.is_valid() {
            self.origin(n)
        } else {
            self.origin(self.twin(he))
        }
    }

    /// Get the face of a half-edge.
    #[inline]
    pub fn face_of(&self, he: HalfEdgeId<I>) -> FaceId<I> {
        self.halfedge(he).face
    }

    /// Check if a half-edge is on the boundary.
    #[inline]
    pub fn is_boundary_halfedge(&self, he: HalfEdgeId<I>) -> bool {
        self.halfedge(he).is_boundary()
    }

    /// Check if an edge (represented by one of its half-edges) is on the boundary.
    #[inline]
    pub fn is_boundary_edge(&self, he: HalfEdgeId<I>) -> bool {
        let t = self.twin(he);
        self.is_boundary_halfedge(he) || !t.is_valid() || self.is_boundary_halfedge(t)
    }

    /// Check if a vertex is on the boundary.
    pub fn is_boundary_vertex(&self, v: VertexId<I>) -> bool {
        let start = self.vertex(v).halfedge;
        if !start.is_valid() {
            return true; // Isolated vertex
        }

        let mut he = start;
        loop {
            if self.is_boundary_halfedge(he) {
                return true;
            }
            let t = self.twin(he);
            if !t.is_valid() {
                return true;
            }
            he = self.next(t);
            if he == start {
                break;
            }
        }
        false
    }

    /// Check if an interior edge is a seam: the faces on both sides use
    /// distinct (colocal) vertex records for its endpoints.
    pub fn is_seam(&self, he: HalfEdgeId<I>) -> bool {
        let t = self.twin(he);
        if !t.is_valid() || self.is_boundary_halfedge(he) || self.is_boundary_halfedge(t) {
            return false;
        }
        self.origin(he) != self.dest(t) || self.dest(he) != self.origin(t)
    }

    /// Check if an interior edge is a normal seam: vertex normals disagree
    /// across the edge.
    pub fn is_normal_seam(&self, he: HalfEdgeId<I>) -> bool {
        let t = self.twin(he);
        if !t.is_valid() || self.is_boundary_halfedge(he) || self.is_boundary_halfedge(t) {
            return false;
        }
        self.vertex(self.origin(he)).normal != self.vertex(self.dest(t)).normal
            || self.vertex(self.dest(he)).normal != self.vertex(self.origin(t)).normal
    }

    /// Check if an interior edge is a texture seam: input UVs disagree across
    /// the edge.
    pub fn is_texture_seam(&self, he: HalfEdgeId<I>) -> bool {
        let t = self.twin(he);
        if !t.is_valid() || self.is_boundary_halfedge(he) || self.is_boundary_halfedge(t) {
            return false;
        }
        self.vertex(self.origin(he)).tex != self.vertex(self.dest(t)).tex
            || self.vertex(self.dest(he)).tex != self.vertex(self.origin(t)).tex
    }

    // ==================== Iteration ====================

    /// Iterate over all vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        (0..self.vertices.len()).map(|i| VertexId::new(i))
    }

    /// Iterate over all vertices with their IDs.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId<I>, &Vertex<I>)> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (VertexId::new(i), v))
    }

    /// Iterate over all half-edge IDs.
    pub fn halfedge_ids(&self) -> impl Iterator<Item = HalfEdgeId<I>> + '_ {
        (0..self.halfedges.len()).map(|i| HalfEdgeId::new(i))
    }

    /// Iterate over all half-edges with their IDs.
    pub fn halfedges(&self) -> impl Iterator<Item = (HalfEdgeId<I>, &HalfEdge<I>)> + '_ {
        self.halfedges
            .iter()
            .enumerate()
            .map(|(i, he)| (HalfEdgeId::new(i), he))
    }

    /// Iterate over all face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        (0..self.faces.len()).map(|i| FaceId::new(i))
    }

    /// Iterate over half-edges around a face.
    pub fn face_halfedges(&self, f: FaceId<I>) -> FaceHalfEdgeIter<'_, I> {
        FaceHalfEdgeIter::new(self, f)
    }

    /// Iterate over half-edges around a vertex (outgoing half-edges).
    ///
    /// Only valid after [`link_boundary`](Self::link_boundary).
    pub fn vertex_halfedges(&self, v: VertexId<I>) -> VertexHalfEdgeIter<'_, I> {
        VertexHalfEdgeIter::new(self, v)
    }

    /// Iterate over faces adjacent to a vertex.
    pub fn vertex_faces(&self, v: VertexId<I>) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.vertex_halfedges(v).filter_map(|he| {
            let f = self.face_of(he);
            if f.is_valid() {
                Some(f)
            } else {
                None
            }
        })
    }

    /// Get the three vertices of a face.
    pub fn face_triangle(&self, f: FaceId<I>) -> [VertexId<I>; 3] {
        let he0 = self.face(f).halfedge;
        let he1 = self.next(he0);
        let he2 = self.next(he1);
        [self.origin(he0), self.origin(he1), self.origin(he2)]
    }

    /// Get the positions of the three vertices of a face.
    pub fn face_positions(&self, f: FaceId<I>) -> [Point3<f64>; 3] {
        let [v0, v1, v2] = self.face_triangle(f);
        [*self.position(v0), *self.position(v1), *self.position(v2)]
    }

    // ==================== Geometry ====================

    /// Compute the normal of a face.
    ///
    /// Returns the zero vector for geometrically degenerate faces.
    pub fn face_normal(&self, f: FaceId<I>) -> Vector3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        let n = (p1 - p0).cross(&(p2 - p0));
        n.try_normalize(1e-12).unwrap_or_else(Vector3::zeros)
    }

    /// Compute the area of a face.
    pub fn face_area(&self, f: FaceId<I>) -> f64 {
        let [p0, p1, p2] = self.face_positions(f);
        0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
    }

    /// Compute the length of an edge.
    pub fn edge_length(&self, he: HalfEdgeId<I>) -> f64 {
        let p0 = self.position(self.origin(he));
        let p1 = self.position(self.dest(he));
        (p1 - p0).norm()
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.face_ids().map(|f| self.face_area(f)).sum()
    }

    /// Compute the bounding box of the mesh.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        if self.vertices.is_empty() {
            return None;
        }

        let mut min = self.vertices[0].position;
        let mut max = self.vertices[0].position;

        for v in &self.vertices {
            for i in 0..3 {
                min[i] = min[i].min(v.position[i]);
                max[i] = max[i].max(v.position[i]);
            }
        }

        Some((min, max))
    }

    // ==================== Construction ====================

    /// Add a new vertex and return its ID.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexId<I> {
        let id = VertexId::new(self.vertices.len());
        let mut v = Vertex::new(position);
        v.canonical = id;
        self.vertices.push(v);
        id
    }

    /// Union vertices sharing a canonical index so that traversal treats them
    /// as topologically identical, without merging their attribute data.
    ///
    /// `map[i]` is the lowest input index among vertices colocal with vertex
    /// `i` (a vertex with no colocals maps to itself). Must be called after
    /// all vertices are added and before the first [`add_face`](Self::add_face).
    pub fn link_colocals_with_canonical_map(&mut self, map: &[usize]) {
        let n = self.vertices.len();
        for (i, &c) in map.iter().enumerate().take(n) {
            let c = if c < n { c.min(i) } else { i };
            self.vertices[i].canonical = VertexId::new(c);
        }
    }

    /// Attempt to insert a triangle, wiring half-edges to existing opposites
    /// by shared (canonical) endpoint pairs.
    ///
    /// Returns `None` without mutating any state if the insertion would
    /// create a non-manifold edge: an edge already traversed in the same
    /// direction by another face (inconsistent orientation or duplicate), an
    /// edge already bounded by two faces, or a topologically degenerate
    /// triangle (two corners colocal). Callers should aggregate `None`
    /// returns into a non-manifold-input diagnostic.
    pub fn add_face(
        &mut self,
        v0: VertexId<I>,
        v1: VertexId<I>,
        v2: VertexId<I>,
    ) -> Option<FaceId<I>> {
        let corners = [v0, v1, v2];
        let canon = [self.canonical(v0), self.canonical(v1), self.canonical(v2)];

        // Topologically degenerate triangles can never be manifold.
        if canon[0] == canon[1] || canon[1] == canon[2] || canon[2] == canon[0] {
            return None;
        }

        // Check all three edges before touching any state.
        for i in 0..3 {
            let key = (canon[i], canon[(i + 1) % 3]);
            if self.edge_map.contains_key(&key) {
                return None; // Same-direction edge already in use.
            }
            if let Some(&opp) = self.edge_map.get(&(key.1, key.0)) {
                if self.halfedge(opp).twin.is_valid() {
                    return None; // Edge already bounded by two faces.
                }
            }
        }

        // Commit: create the three half-edges and the face.
        let base = self.halfedges.len();
        let hes = [
            HalfEdgeId::new(base),
            HalfEdgeId::new(base + 1),
            HalfEdgeId::new(base + 2),
        ];
        for _ in 0..3 {
            self.halfedges.push(HalfEdge::new());
        }

        let face_id = FaceId::new(self.faces.len());
        self.faces.push(Face::new(hes[0]));

        for i in 0..3 {
            let he = self.halfedge_mut(hes[i]);
            he.origin = corners[i];
            he.next = hes[(i + 1) % 3];
            he.prev = hes[(i + 2) % 3];
            he.face = face_id;
        }

        for i in 0..3 {
            let key = (canon[i], canon[(i + 1) % 3]);
            self.edge_map.insert(key, hes[i]);
            let opp = self.edge_map.get(&(key.1, key.0)).copied();
            if let Some(opp) = opp {
                self.halfedge_mut(hes[i]).twin = opp;
                self.halfedge_mut(opp).twin = hes[i];
            }

            if !self.vertex(corners[i]).halfedge.is_valid() {
                self.vertex_mut(corners[i]).halfedge = hes[i];
            }
        }

        Some(face_id)
    }

    /// Stitch boundary half-edges into consistent closed loops.
    ///
    /// Creates a boundary twin for every unpaired interior half-edge and
    /// links the boundary half-edges into loops by colocal origin. Must run
    /// after the last [`add_face`](Self::add_face); segmentation relies on it
    /// to measure boundary length and to terminate vertex traversal.
    pub fn link_boundary(&mut self) {
        // Create boundary twins.
        let interior_count = self.halfedges.len();
        for i in 0..interior_count {
            if self.halfedges[i].twin.is_valid() {
                continue;
            }
            let he = HalfEdgeId::new(i);
            let b = HalfEdgeId::new(self.halfedges.len());
            let origin = self.dest(he);
            let mut bhe = HalfEdge::new();
            bhe.origin = origin;
            bhe.twin = he;
            self.halfedges.push(bhe);
            self.halfedges[i].twin = b;
        }

        // Group boundary half-edges by canonical origin, in id order.
        let mut outgoing: HashMap<VertexId<I>, Vec<HalfEdgeId<I>>> = HashMap::new();
        for i in interior_count..self.halfedges.len() {
            let he = HalfEdgeId::new(i);
            let key = self.canonical(self.origin(he));
            outgoing.entry(key).or_default().push(he);
        }

        // Link each boundary half-edge to a successor starting at its
        // destination. Consuming entries front-to-back keeps the linking
        // deterministic even at bowtie vertices with several loops.
        for i in interior_count..self.halfedges.len() {
            let he = HalfEdgeId::new(i);
            let dest = self.canonical(self.origin(self.twin(he)));
            if let Some(candidates) = outgoing.get_mut(&dest) {
                if let Some(pos) = candidates.iter().position(|c| c.is_valid()) {
                    let next = candidates[pos];
                    candidates[pos] = HalfEdgeId::invalid();
                    self.halfedge_mut(he).next = next;
                    self.halfedge_mut(next).prev = he;
                }
            }
        }

        // Boundary vertices point at an outgoing boundary half-edge so the
        // vertex circulator starts on the boundary fan.
        for i in interior_count..self.halfedges.len() {
            let he = HalfEdgeId::new(i);
            let v = self.origin(he);
            self.vertex_mut(v).halfedge = he;
        }
    }

    // ==================== Validation ====================

    /// Check that all connectivity is consistent.
    pub fn is_valid(&self) -> bool {
        for (vid, v) in self.vertices() {
            if v.halfedge.is_valid() && self.halfedge(v.halfedge).origin != vid {
                return false;
            }
        }

        for (heid, he) in self.halfedges() {
            if he.twin.is_valid() && self.halfedge(he.twin).twin != heid {
                return false;
            }
            if he.next.is_valid() && self.halfedge(he.next).prev != heid {
                return false;
            }
            if he.prev.is_valid() && self.halfedge(he.prev).next != heid {
                return false;
            }
        }

        for f in self.face_ids() {
            if !self.face(f).halfedge.is_valid() {
                return false;
            }
        }

        true
    }
}

/// Iterator over half-edges around a vertex.
pub struct VertexHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: HalfEdgeId<I>,
    current: HalfEdgeId<I>,
    done: bool,
}

impl<'a, I: MeshIndex> VertexHalfEdgeIter<'a, I> {
    fn new(mesh: &'a HalfEdgeMesh<I>, v: VertexId<I>) -> Self {
        let start = mesh.vertex(v).halfedge;
        Self {
            mesh,
            start,
            current: start,
            done: !start.is_valid(),
        }
    }
}

impl<'a, I: MeshIndex> Iterator for VertexHalfEdgeIter<'a, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;

        // If he goes v -> w, then twin(he) goes w -> v, and next(twin(he))
        // is the next outgoing half-edge from v.
        let t = self.mesh.twin(self.current);
        if !t.is_valid() {
            self.done = true;
            return Some(result);
        }
        self.current = self.mesh.next(t);

        if self.current == self.start || !self.current.is_valid() {
            self.done = true;
        }

        Some(result)
    }
}

/// Iterator over half-edges around a face.
pub struct FaceHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: HalfEdgeId<I>,
    current: HalfEdgeId<I>,
    done: bool,
}

impl<'a, I: MeshIndex> FaceHalfEdgeIter<'a, I> {
    fn new(mesh: &'a HalfEdgeMesh<I>, f: FaceId<I>) -> Self {
        let start = mesh.face(f).halfedge;
        Self {
            mesh,
            start,
            current: start,
            done: !start.is_valid(),
        }
    }
}

impl<'a, I: MeshIndex> Iterator for FaceHalfEdgeIter<'a, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;
        self.current = self.mesh.next(self.current);

        if self.current == self.start {
            self.done = true;
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_mesh() -> HalfEdgeMesh<u32> {
        let mut mesh = HalfEdgeMesh::new();
        let v0 = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let v2 = mesh.add_vertex(Point3::new(0.5, 1.0, 0.0));
        assert!(mesh.add_face(v0, v1, v2).is_some());
        mesh.link_boundary();
        mesh
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = HalfEdgeMesh::<u32>::new();
        assert_eq!(mesh.num_vertices(), 0);
        assert_eq!(mesh.num_halfedges(), 0);
        assert_eq!(mesh.num_faces(), 0);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_single_triangle() {
        let mesh = triangle_mesh();
        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.num_faces(), 1);
        // 3 interior half-edges + 3 boundary half-edges
        assert_eq!(mesh.num_halfedges(), 6);
        assert!(mesh.is_valid());

        for v in mesh.vertex_ids() {
            assert!(mesh.is_boundary_vertex(v));
        }
    }

    #[test]
    fn test_boundary_loop_closed() {
        let mesh = triangle_mesh();
        // Walk the boundary loop; it must return to the start in 3 steps.
        let start = mesh
            .halfedge_ids()
            .find(|&he| mesh.is_boundary_halfedge(he))
            .unwrap();
        let mut he = start;
        for _ in 0..3 {
            he = mesh.next(he);
            assert!(he.is_valid());
        }
        assert_eq!(he, start);
    }

    #[test]
    fn test_two_triangles_share_edge() {
        let mut mesh = HalfEdgeMesh::<u32>::new();
        let v0 = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let v2 = mesh.add_vertex(Point3::new(0.5, 1.0, 0.0));
        let v3 = mesh.add_vertex(Point3::new(0.5, -1.0, 0.0));
        assert!(mesh.add_face(v0, v1, v2).is_some());
        assert!(mesh.add_face(v1, v0, v3).is_some());
        mesh.link_boundary();

        assert_eq!(mesh.num_faces(), 2);
        // 6 interior + 4 boundary half-edges
        assert_eq!(mesh.num_halfedges(), 10);
        assert!(mesh.is_valid());

        // The shared edge is interior.
        let interior = mesh
            .halfedge_ids()
            .filter(|&he| !mesh.is_boundary_edge(he))
            .count();
        assert_eq!(interior, 2);
    }

    #[test]
    fn test_third_face_on_edge_rejected() {
        let mut mesh = HalfEdgeMesh::<u32>::new();
        let v0 = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let v2 = mesh.add_vertex(Point3::new(0.5, 1.0, 0.0));
        let v3 = mesh.add_vertex(Point3::new(0.5, -1.0, 0.0));
        let v4 = mesh.add_vertex(Point3::new(0.5, 0.5, 1.0));
        assert!(mesh.add_face(v0, v1, v2).is_some());
        assert!(mesh.add_face(v1, v0, v3).is_some());

        let before_he = mesh.num_halfedges();
        let before_f = mesh.num_faces();
        // Edge (v0, v1) already has two faces; a third must be rejected
        // without mutating anything.
        assert!(mesh.add_face(v0, v1, v4).is_none());
        assert!(mesh.add_face(v1, v0, v4).is_none());
        assert_eq!(mesh.num_halfedges(), before_he);
        assert_eq!(mesh.num_faces(), before_f);

        mesh.link_boundary();
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_inconsistent_winding_rejected() {
        let mut mesh = HalfEdgeMesh::<u32>::new();
        let v0 = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let v2 = mesh.add_vertex(Point3::new(0.5, 1.0, 0.0));
        let v3 = mesh.add_vertex(Point3::new(0.5, -1.0, 0.0));
        assert!(mesh.add_face(v0, v1, v2).is_some());
        // Same direction (v0 -> v1) as the first face: flipped neighbor.
        assert!(mesh.add_face(v0, v1, v3).is_none());
    }

    #[test]
    fn test_degenerate_face_rejected() {
        let mut mesh = HalfEdgeMesh::<u32>::new();
        let v0 = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        assert!(mesh.add_face(v0, v0, v1).is_none());
    }

    #[test]
    fn test_colocal_pairing() {
        // Two triangles that only share positions, not vertex records,
        // as across an authored UV seam.
        let mut mesh = HalfEdgeMesh::<u32>::new();
        let v0 = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let v2 = mesh.add_vertex(Point3::new(0.5, 1.0, 0.0));
        let v3 = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0)); // colocal with v0
        let v4 = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0)); // colocal with v1
        let v5 = mesh.add_vertex(Point3::new(0.5, -1.0, 0.0));
        mesh.vertex_mut(v0).tex = Point2::new(0.0, 0.0);
        mesh.vertex_mut(v3).tex = Point2::new(0.5, 0.5);

        mesh.link_colocals_with_canonical_map(&[0, 1, 2, 0, 1, 5]);
        assert!(mesh.add_face(v0, v1, v2).is_some());
        assert!(mesh.add_face(v4, v3, v5).is_some());
        mesh.link_boundary();

        // The colocal edge became interior: the two faces are neighbors.
        let seam = mesh
            .halfedge_ids()
            .filter(|&he| !mesh.is_boundary_halfedge(he))
            .find(|&he| mesh.is_seam(he));
        assert!(seam.is_some());
        assert!(mesh.is_texture_seam(seam.unwrap()));
        // Only 4 boundary half-edges remain (2 per triangle).
        let boundary = mesh
            .halfedge_ids()
            .filter(|&he| mesh.is_boundary_halfedge(he))
            .count();
        assert_eq!(boundary, 4);
    }

    #[test]
    fn test_face_geometry() {
        let mesh = triangle_mesh();
        let f = FaceId::<u32>::new(0);
        let n = mesh.face_normal(f);
        assert!((n.z - 1.0).abs() < 1e-12);
        assert!((mesh.face_area(f) - 0.5).abs() < 1e-12);
        assert!((mesh.surface_area() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_closed_tetrahedron() {
        let mut mesh = HalfEdgeMesh::<u32>::new();
        let v0 = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let v2 = mesh.add_vertex(Point3::new(0.5, 1.0, 0.0));
        let v3 = mesh.add_vertex(Point3::new(0.5, 0.5, 1.0));
        assert!(mesh.add_face(v0, v2, v1).is_some());
        assert!(mesh.add_face(v0, v1, v3).is_some());
        assert!(mesh.add_face(v1, v2, v3).is_some());
        assert!(mesh.add_face(v2, v0, v3).is_some());
        mesh.link_boundary();

        assert_eq!(mesh.num_halfedges(), 12); // closed: no boundary twins
        assert!(mesh.is_valid());
        for v in mesh.vertex_ids() {
            assert!(!mesh.is_boundary_vertex(v));
        }
    }
}
