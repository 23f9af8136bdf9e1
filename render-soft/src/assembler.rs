//! Primitive assembly: topology decoding over an index getter.
//!
//! The getter abstracts array draws (`first + i`) and indexed draws
//! (element-buffer reads) away from the topology walk. Incomplete trailing
//! primitives are dropped, strips flip winding on odd triangles, fans pin
//! vertex 0, loops close back to the first vertex.

use glint_render::PrimitiveTopology;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Primitive {
    Point(u32),
    Line(u32, u32),
    Triangle(u32, u32, u32),
}

pub fn assemble<G, E>(topology: PrimitiveTopology, count: u32, get_index: G, mut emit: E)
where
    G: Fn(u32) -> u32,
    E: FnMut(Primitive),
{
    match topology {
        PrimitiveTopology::Points => {
            for i in 0..count {
                emit(Primitive::Point(get_index(i)));
            }
        }
        PrimitiveTopology::Lines => {
            let mut i = 0;
            while i + 1 < count {
                emit(Primitive::Line(get_index(i), get_index(i + 1)));
                i += 2;
            }
        }
        PrimitiveTopology::LineStrip => {
            for i in 1..count {
                emit(Primitive::Line(get_index(i - 1), get_index(i)));
            }
        }
        PrimitiveTopology::LineLoop => {
            if count < 2 {
                return;
            }
            for i in 1..count {
                emit(Primitive::Line(get_index(i - 1), get_index(i)));
            }
            emit(Primitive::Line(get_index(count - 1), get_index(0)));
        }
        PrimitiveTopology::Triangles => {
            let mut i = 0;
            while i + 2 < count {
                emit(Primitive::Triangle(
                    get_index(i),
                    get_index(i + 1),
                    get_index(i + 2),
                ));
                i += 3;
            }
        }
        PrimitiveTopology::TriangleStrip => {
            if count < 3 {
                return;
            }
            for i in 0..count - 2 {
                let (a, b, c) = (get_index(i), get_index(i + 1), get_index(i + 2));
                if i % 2 == 0 {
                    emit(Primitive::Triangle(a, b, c));
                } else {
                    // odd strip triangles swap to keep a consistent winding
                    emit(Primitive::Triangle(a, c, b));
                }
            }
        }
        PrimitiveTopology::TriangleFan => {
            if count < 3 {
                return;
            }
            let center = get_index(0);
            for i in 1..count - 1 {
                emit(Primitive::Triangle(center, get_index(i), get_index(i + 1)));
            }
        }
    }
}
