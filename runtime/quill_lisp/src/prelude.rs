//! Standard library written in Lisp itself, evaluated once per process on
//! top of the builtins. Every interpreter starts from a copy of the result.

use std::sync::{Arc, OnceLock};

use quill_value::EvalError;

use crate::builtins;
use crate::interp::{Globals, Interpreter, LoadCache};

/// Core macros and list functions. Order matters: a macro must be defined
/// before a later definition uses it, since bodies are expanded when they
/// are compiled.
const CORE: &str = r#"
(setq defmacro
      (macro (name args &rest body)
             `(progn (setq ,name (macro ,args ,@body))
                     ',name)))

(defmacro defun (name args &rest body)
  `(progn (setq ,name (lambda ,args ,@body))
          ',name))

(defun caar (x) (car (car x)))
(defun cadr (x) (car (cdr x)))
(defun cdar (x) (cdr (car x)))
(defun cddr (x) (cdr (cdr x)))
(defun caaar (x) (car (car (car x))))
(defun caadr (x) (car (car (cdr x))))
(defun cadar (x) (car (cdr (car x))))
(defun caddr (x) (car (cdr (cdr x))))
(defun cdaar (x) (cdr (car (car x))))
(defun cdadr (x) (cdr (car (cdr x))))
(defun cddar (x) (cdr (cdr (car x))))
(defun cdddr (x) (cdr (cdr (cdr x))))
(defun identity (x) x)

(setq
 =      eql
 null   not
 setcar rplaca
 setcdr rplacd)

(defun > (x y) (< y x))
(defun >= (x y) (not (< x y)))
(defun <= (x y) (not (< y x)))
(defun /= (x y) (not (= x y)))
(defun not= (x y) (not (= x y)))

(defun equal (x y)
  (cond ((atom x) (eql x y))
        ((atom y) nil)
        ((equal (car x) (car y)) (equal (cdr x) (cdr y)))))

(defmacro if (test then &rest else)
  `(cond (,test ,then)
         ,@(cond (else `((t ,@else))))))

(defmacro let (args &rest body)
  ((lambda (vars vals)
     (defun vars (x)
       (cond (x (cons (if (atom (car x))
                          (car x)
                        (caar x))
                      (vars (cdr x))))))
     (defun vals (x)
       (cond (x (cons (if (atom (car x))
                          nil
                        (cadar x))
                      (vals (cdr x))))))
     `((lambda ,(vars args) ,@body) ,@(vals args)))
   nil nil))

(defmacro letrec (args &rest body)
  (let (vars sets)
    (defun vars (x)
      (cond (x (cons (caar x)
                     (vars (cdr x))))))
    (defun sets (x)
      (cond (x (cons `(setq ,(caar x) ,(cadar x))
                     (sets (cdr x))))))
    `(let ,(vars args) ,@(sets args) ,@body)))

(defun _append (x y)
  (if (null x)
      y
    (cons (car x) (_append (cdr x) y))))
(defmacro append (x &rest y)
  (if (null y)
      x
    `(_append ,x (append ,@y))))

(defmacro and (x &rest y)
  (if (null y)
      x
    `(cond (,x (and ,@y)))))

(defmacro or (x &rest y)
  (if (null y)
      x
    `(cond (,x)
           ((or ,@y)))))

(defun mapcar (f x)
  (and x (cons (f (car x)) (mapcar f (cdr x)))))

(defun listp (x)
  (or (null x) (consp x)))

(defun memq (key x)
  (cond ((null x) nil)
        ((eq key (car x)) x)
        (t (memq key (cdr x)))))

(defun member (key x)
  (cond ((null x) nil)
        ((equal key (car x)) x)
        (t (member key (cdr x)))))

(defun assq (key alist)
  (cond (alist (let ((e (car alist)))
                 (if (and (consp e) (eq key (car e)))
                     e
                   (assq key (cdr alist)))))))

(defun assoc (key alist)
  (cond (alist (let ((e (car alist)))
                 (if (and (consp e) (equal key (car e)))
                     e
                   (assoc key (cdr alist)))))))

(defun _nreverse (x prev)
  (let ((next (cdr x)))
    (setcdr x prev)
    (if (null next)
        x
      (_nreverse next x))))
(defun nreverse (list)
  (cond (list (_nreverse list nil))))

(defun last (list)
  (if (atom (cdr list))
      list
    (last (cdr list))))

(defun nconc (&rest lists)
  (if (null (cdr lists))
      (car lists)
    (if (null (car lists))
        (apply nconc (cdr lists))
      (setcdr (last (car lists))
              (apply nconc (cdr lists)))
      (car lists))))

(defmacro while (test &rest body)
  (let ((loop (gensym)))
    `(letrec ((,loop (lambda () (cond (,test ,@body (,loop))))))
       (,loop))))

(defmacro dolist (spec &rest body)
  (let ((name (car spec))
        (list (gensym)))
    `(let (,name
           (,list ,(cadr spec)))
       (while ,list
         (setq ,name (car ,list))
         ,@body
         (setq ,list (cdr ,list)))
       ,@(if (cddr spec)
             `((setq ,name nil)
               ,(caddr spec))))))

(defmacro dotimes (spec &rest body)
  (let ((name (car spec))
        (count (gensym)))
    `(let ((,name 0)
           (,count ,(cadr spec)))
       (while (< ,name ,count)
         ,@body
         (setq ,name (+ ,name 1)))
       ,@(if (cddr spec)
             `(,(caddr spec))))))
"#;

/// Common utilities built on the core.
const UTILS: &str = r#"
(defmacro def (k v)
  (list 'progn (list 'setq k v)))

(defmacro incf (elem &rest num)
  (cond ((not num) `(setq ,elem (+ 1 ,elem)))
        (t `(setq ,elem (+ ,@num ,elem)))))

(defmacro decf (elem &rest num)
  (cond ((not num) `(setq ,elem (- ,elem 1)))
        (t `(setq ,elem (- ,elem ,@num)))))

(defun 1+ (n) (+ n 1))
(defun 1- (n) (- n 1))

(defmacro when (condition &rest body)
  `(if ,condition (progn ,@body)))
(defmacro unless (condition &rest body)
  `(if (not ,condition) (progn ,@body)))

(defmacro push-end (e l)
  `(setq ,l (append ,l (list ,e))))
(defmacro push (e l)
  `(setq ,l (cons ,e ,l)))
(defmacro pop (l)
  `(let ((v (car ,l)))
     (setq ,l (cdr ,l))
     v))

(defun mapcan (f l)
  (apply nconc (mapcar f l)))

(defun mapc (f l)
  (mapcar f l) l)

(defun reduce (f l &rest init)
  (let ((acc (cond (init (car init))
                   (t (f)))))
    (if (endp l)
        acc
      (reduce f (cdr l) (f acc (car l))))))

(defun zip (f l1 l2)
  (let ((to))
    (dolist (a l1)
      (dolist (b l2)
        (push (f a b) to)))
    (nreverse to)))

(defun nthcdr (n l)
  (if (zerop n)
      l
    (nthcdr (- n 1) (cdr l))))

(defun reverse (l)
  (let ((to '()))
    (dolist (e l to)
      (push e to))))

(defun butlast (l)
  (reverse (nthcdr 1 (reverse l))))
(defun nbutlast (l)
  (nreverse (nthcdr 1 (nreverse l))))

(defun filter (f l)
  (mapcan (fn (e) (if (f e) (list e) nil)) (to-cons l)))

(defun remove-if (f l)
  (filter (fn (e) (not (f e))) l))

(defun some (f l)
  (let ((to nil))
    (while (and l (not (setq to (f (pop l))))))
    to))

(defun every (f l)
  (let ((to t))
    (while (and l (setq to (f (pop l)))))
    to))

(defun flatten (l)
  (mapcan
   (fn (a)
       (cond ((atom a) (list a))
             (t (flatten a))))
   l))

(defun elt (l n)
  (if (>= n (length l)) (error "index out of range"))
  (let ((rest l))
    (dotimes (i n)
      (setq rest (cdr rest)))
    (car rest)))

(defun range (n)
  (let ((to '()))
    (dotimes (i n)
      (push i to))
    (nreverse to)))

(defun set-difference (l1 l2)
  (if l2
      (let ((res nil))
        (dolist (e l1)
          (unless (member e l2)
            (push e res)))
        (nreverse res))
    l1))

(defun union (l1 l2)
  (let ((res nil))
    (dolist (e l1)
      (unless (member e res)
        (push e res)))
    (dolist (e l2)
      (unless (member e res)
        (push e res)))
    (nreverse res)))
"#;

/// Clojure-flavoured names and sequence helpers.
const EXTENSIONS: &str = r#"
(defmacro dolist-while (spec f &rest body)
  (let ((name (car spec))
        (list (gensym)))
    `(let (,name
           (,list ,(cadr spec)))
       (while (and ,list (,f (car ,list)))
         (setq ,name (car ,list))
         ,@body
         (setq ,list (cdr ,list)))
       ,@(if (cddr spec)
             `((setq ,name nil)
               ,(caddr spec))))))

(defmacro doseq (spec &rest body)
  `(dolist (,(car spec) (to-cons ,(cadr spec)) ,@(cddr spec))
     ,@body))

(defun skip-while (f l)
  (let ((to) (go))
    (dolist (e l)
      (if (and (not go) (not (f e))) (setq go t))
      (if go (push e to)))
    (nreverse to)))

(defun take-while (f l)
  (let ((to))
    (dolist-while (e l) #(f %)
      (push e to))
    (nreverse to)))

(defun assoc-key (k l) (car (assoc k l)))
(defun assoc-value (k l) (cadr (assoc k l)))

(defun even? (n) (= (% n 2) 0))
(defun odd? (n) (not (even? n)))

(defun flatmap (f l)
  (mapcan #(to-cons (f %)) (to-cons l)))

(defun map-index (f l)
  (let ((i -1))
    (map (fn (x) (f x (incf i))) l)))

(defun filter-index (f l)
  (let ((i -1))
    (filter (fn (x) (f x (incf i))) l)))

(setq
 first  car
 1st    car
 second cadr
 2nd    cadr
 third  caddr
 3rd    caddr
 next   cdr
 rest   cdr
 skip2  cddr
 inc    1+
 dec    1-

 atom?  atom
 cons?  consp
 list?  listp
 end?   endp
 zero?  zerop
 all    every
 any    some
 lower-case string-downcase
 upper-case string-upcase

 defn   defun)
"#;

static BASE: OnceLock<Result<Arc<Globals>, EvalError>> = OnceLock::new();

/// Builtins plus the evaluated prelude, shared by every interpreter.
pub(crate) fn base() -> Result<Arc<Globals>, EvalError> {
    BASE.get_or_init(|| {
        let mut interp =
            Interpreter::from_base(Arc::new(builtins::globals()), LoadCache::default());
        for source in [CORE, UTILS, EXTENSIONS] {
            interp.eval_source(source)?;
        }
        tracing::debug!(globals = interp.globals().len(), "lisp prelude loaded");
        Ok(Arc::new(interp.into_globals()))
    })
    .clone()
}
